//! Prompt construction for classification and refinement calls.

use serde_json::{Map, Value};

use kometa_core::{CollectionConfig, Movie};

/// System prompt for batch classification. Instructs the model to emit
/// only JSON in the decisions schema, one entry per requested movie, with
/// reasoning reserved for borderline confidence.
pub fn system_prompt() -> &'static str {
    r#"You are a film expert tasked with categorizing movies for a media server. Your job is to determine which movies belong in a specific collection based on the provided criteria.

Guidelines:
1. Focus ONLY on the specific collection definition and criteria provided
2. Consider all relevant movie attributes (title, year, genres, plot, studio, alternate titles)
3. Apply the collection criteria consistently across all movies
4. Provide a confidence score (0.0-1.0) for each decision
5. Include reasoning ONLY for borderline cases (confidence between 0.4-0.8)
6. Return one decision per movie id you were given
7. Do not consider personal preferences or subjective quality judgments

When evaluating movies:
- Be objective and follow the criteria exactly
- Do not artificially limit the number of movies in a collection
- For movies with little information, use your knowledge about films to supplement the data
- Evaluate the movie's actual content and themes, not just what's mentioned in the overview
- Consider the movie's primary themes and genres, not incidental elements

IMPORTANT: For collections based on themes or genres, focus on whether the movie is primarily about that theme/genre, not whether it contains elements of it. For example:
- A movie with one heist scene is not necessarily a "Heist Movie"
- A movie set partly in space is not necessarily a "Space Movie"
- A movie with some comedy is not necessarily a "Comedy Movie"

Your response must follow this exact JSON format:
{
  "collection_name": "Name of the collection",
  "decisions": [
    {
      "movie_id": 123,
      "title": "Movie Title",
      "include": true,
      "confidence": 0.95,
      "reasoning": "Optional explanation for borderline cases"
    }
  ]
}

IMPORTANT: Return valid JSON only. Do not include markdown formatting or explanatory text outside the JSON structure."#
}

/// System prompt for the single-movie refinement pass.
pub fn refinement_system_prompt() -> &'static str {
    r#"You are a film expert providing detailed analysis of whether a specific movie belongs in a themed collection.

For the movie and collection provided, conduct a thorough analysis using your knowledge of cinema. Go beyond the basic information provided to analyze the movie's themes, style, reception, and how it fits the collection criteria.

Return your analysis in this JSON format:
{
  "movie_title": "Title of the movie",
  "collection_name": "Name of the collection",
  "detailed_analysis": "Your in-depth analysis of why this movie does or doesn't belong",
  "include": true,
  "confidence": 0.95,
  "reasoning": "Concise explanation of your final decision"
}"#
}

/// The per-collection user prompt: criteria, exemplars, and instructions.
pub fn collection_prompt(collection: &CollectionConfig) -> String {
    let criteria = collection.prompt.trim();
    let mut prompt = format!(
        "I need you to categorize movies for the \"{name}\" collection.\n\n\
         COLLECTION DEFINITION AND CRITERIA:\n{criteria}\n",
        name = collection.name,
        criteria = criteria,
    );

    if !collection.example_inclusions.is_empty() {
        prompt.push_str("\nExamples that BELONG in this collection:\n");
        for example in &collection.example_inclusions {
            prompt.push_str(&format!("- {}\n", example));
        }
    }
    if !collection.example_exclusions.is_empty() {
        prompt.push_str("\nExamples that DO NOT belong in this collection:\n");
        for example in &collection.example_exclusions {
            prompt.push_str(&format!("- {}\n", example));
        }
    }

    prompt.push_str(&format!(
        "\nFor each movie in the provided list, evaluate whether it belongs in the {name} \
         collection based on these criteria. Provide your decision and a confidence level \
         (0.0-1.0) for each movie.\n\n\
         The minimum confidence threshold for inclusion is {threshold}. Movies below this \
         threshold will not be included, so be careful not to underestimate your confidence \
         if you believe a movie should be included.\n\n\
         Only include movies that strongly match the collection's theme. A movie that \
         contains minor elements related to the theme should NOT be included.\n\n\
         Return your evaluation in the required JSON format ONLY, with no additional text \
         outside the JSON structure.",
        name = collection.name,
        threshold = collection.confidence_threshold,
    ));

    prompt
}

/// Serialize a movie batch as a JSON array for the user prompt.
pub fn movies_data(movies: &[&Movie]) -> String {
    let entries: Vec<Value> = movies.iter().map(|m| movie_entry(m)).collect();
    serde_json::to_string_pretty(&Value::Array(entries))
        .unwrap_or_else(|e| panic!("serialization error building movie batch: {}", e))
}

fn movie_entry(movie: &Movie) -> Value {
    let mut entry = Map::new();
    entry.insert("movie_id".to_string(), Value::from(movie.id));
    entry.insert("title".to_string(), Value::String(movie.title.clone()));
    if let Some(year) = movie.year {
        entry.insert("year".to_string(), Value::from(year));
    }
    entry.insert(
        "genres".to_string(),
        Value::Array(movie.genres.iter().map(|g| Value::String(g.clone())).collect()),
    );
    if let Some(overview) = &movie.overview {
        entry.insert("overview".to_string(), Value::String(overview.clone()));
    }
    if let Some(studio) = &movie.studio {
        entry.insert("studio".to_string(), Value::String(studio.clone()));
    }
    let alternates = movie.alternate_title_strings();
    if !alternates.is_empty() {
        entry.insert(
            "alternative_titles".to_string(),
            Value::Array(alternates.into_iter().map(Value::String).collect()),
        );
    }
    Value::Object(entry)
}

/// The full classification user prompt for one batch.
pub fn classification_prompt(collection: &CollectionConfig, movies: &[&Movie]) -> String {
    format!(
        "{}\n\nMOVIES TO EVALUATE:\n{}\n\nIMPORTANT: Respond ONLY with a valid JSON object \
         containing 'collection_name' and 'decisions' fields.",
        collection_prompt(collection),
        movies_data(movies),
    )
}

/// The single-movie refinement prompt for a borderline decision.
pub fn refinement_prompt(collection: &CollectionConfig, movie: &Movie) -> String {
    let year = movie
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "unknown year".to_string());
    format!(
        "I need your help analyzing whether the movie \"{title}\" ({year}) should be included \
         in the \"{name}\" collection.\n\n\
         MOVIE DETAILS:\n\
         - Title: {title}\n\
         - Year: {year}\n\
         - Genres: {genres}\n\
         - Overview: {overview}\n\
         - Studio: {studio}\n\n\
         COLLECTION CRITERIA:\n{criteria}\n\n\
         This is a borderline case that needs deeper analysis. Use your knowledge of films to \
         analyze this movie beyond the basic information provided. Consider:\n\n\
         1. The primary themes and focus of the movie\n\
         2. The genre conventions the movie follows\n\
         3. Whether the collection theme is central to the movie or just incidental\n\
         4. Similar movies that are definitively in or out of this collection\n\
         5. Critical reception and how the movie is categorized by experts\n\n\
         Based on your analysis, provide a detailed evaluation with a final confidence score \
         and a clear yes/no decision.",
        title = movie.title,
        year = year,
        name = collection.name,
        genres = movie.genres.join(", "),
        overview = movie.overview.as_deref().unwrap_or("Not available"),
        studio = movie.studio.as_deref().unwrap_or("Unknown"),
        criteria = collection.prompt.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn movie(id: i64, title: &str) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            year: Some(1974),
            overview: Some("Overview text.".to_string()),
            genres: vec!["Crime".to_string()],
            studio: None,
            alternate_titles: vec![],
            directors: vec![],
            actors: vec![],
            tag_ids: vec![],
            extra: Map::new(),
        }
    }

    #[test]
    fn test_collection_prompt_carries_criteria_verbatim() {
        let mut config = CollectionConfig::new("Film Noir");
        config.prompt = "Dark, cynical crime dramas.\n- femme fatales".to_string();
        let prompt = collection_prompt(&config);
        assert!(prompt.contains("Dark, cynical crime dramas."));
        assert!(prompt.contains("- femme fatales"));
        assert!(prompt.contains("0.7"));
    }

    #[test]
    fn test_collection_prompt_lists_exemplars() {
        let mut config = CollectionConfig::new("Film Noir");
        config.prompt = "Criteria.".to_string();
        config.example_inclusions = vec!["Double Indemnity".to_string()];
        config.example_exclusions = vec!["Toy Story".to_string()];
        let prompt = collection_prompt(&config);
        assert!(prompt.contains("BELONG in this collection:\n- Double Indemnity"));
        assert!(prompt.contains("DO NOT belong in this collection:\n- Toy Story"));
    }

    #[test]
    fn test_movies_data_is_json_array() {
        let a = movie(1, "Chinatown");
        let b = movie(2, "Toy Story");
        let data = movies_data(&[&a, &b]);
        let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["movie_id"], 1);
        assert_eq!(parsed[1]["title"], "Toy Story");
        // Absent studio stays absent rather than null.
        assert!(parsed[0].get("studio").is_none());
    }

    #[test]
    fn test_system_prompt_demands_json_only() {
        let prompt = system_prompt();
        assert!(prompt.contains("Return valid JSON only"));
        assert!(prompt.contains("Heist Movie"));
    }

    #[test]
    fn test_refinement_prompt_names_movie_and_collection() {
        let config = CollectionConfig::new("Film Noir");
        let m = movie(1, "Chinatown");
        let prompt = refinement_prompt(&config, &m);
        assert!(prompt.contains("\"Chinatown\" (1974)"));
        assert!(prompt.contains("\"Film Noir\" collection"));
    }
}
