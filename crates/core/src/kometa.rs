//! Extraction of `=== KOMETA-AI ===` comment blocks from Kometa YAML files.
//!
//! The block grammar is deliberately not round-tripped through a YAML
//! parser: the block is isolated textually and its body parsed as a
//! one-key-per-line grammar with a single pipe-literal value (`prompt`,
//! always last). The host file is only ever rewritten to update a
//! `radarr_taglist` scalar, byte-identically otherwise.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::collection::CollectionConfig;
use crate::error::KometaError;

const START_MARKER: &str = "=== KOMETA-AI ===";
const END_MARKER: &str = "=== END KOMETA-AI ===";

/// Keys the block grammar understands. A line `<key>: <value>` at the
/// block's base indent is configuration even when it appears after the
/// `prompt: |` opener.
const RECOGNIZED_KEYS: &[&str] = &[
    "enabled",
    "confidence_threshold",
    "priority",
    "include_tags",
    "exclude_tags",
    "use_iterative_refinement",
    "refinement_threshold",
    "example_inclusions",
    "example_exclusions",
    "prompt",
];

/// A non-fatal problem found while extracting collection configs.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub collection: Option<String>,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.collection {
            Some(name) => write!(f, "{} [{}]: {}", self.file.display(), name, self.message),
            None => write!(f, "{}: {}", self.file.display(), self.message),
        }
    }
}

/// Result of a full extraction pass over the config directory.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Enabled configs, sorted by priority descending then name.
    pub configs: Vec<CollectionConfig>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parser for a Kometa configuration directory.
pub struct KometaParser {
    config_dir: PathBuf,
    fix_tags: bool,
}

impl KometaParser {
    pub fn new(config_dir: impl Into<PathBuf>, fix_tags: bool) -> Self {
        KometaParser {
            config_dir: config_dir.into(),
            fix_tags,
        }
    }

    /// Find all YAML files under the config directory, skipping names
    /// prefixed with `.` or `_`.
    pub fn find_config_files(&self) -> Result<Vec<PathBuf>, KometaError> {
        let mut files = Vec::new();
        collect_yaml_files(&self.config_dir, &mut files)
            .map_err(|e| KometaError::io(&self.config_dir, e))?;
        files.sort();
        debug!(count = files.len(), dir = %self.config_dir.display(), "found config files");
        Ok(files)
    }

    /// Extract every collection config in the directory.
    ///
    /// Files that fail to open are reported and skipped; blocks that fail
    /// to yield a valid config are reported and skipped. Only enabled
    /// configs are returned, sorted by priority descending then name.
    pub fn parse_configs(&self) -> Result<ParseOutcome, KometaError> {
        let mut outcome = ParseOutcome::default();
        let mut total = 0usize;

        for path in self.find_config_files()? {
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    outcome.diagnostics.push(Diagnostic {
                        file: path.clone(),
                        collection: None,
                        message: format!("could not read file: {}", e),
                    });
                    continue;
                }
            };
            total += self.extract_from_file(&path, &content, &mut outcome);
        }

        // Enabled configs must have a prompt and a unique tag.
        let mut seen_tags: Vec<String> = Vec::new();
        let mut configs = Vec::new();
        for config in std::mem::take(&mut outcome.configs) {
            if config.prompt.trim().is_empty() {
                outcome.diagnostics.push(Diagnostic {
                    file: self.config_dir.clone(),
                    collection: Some(config.name.clone()),
                    message: "enabled collection has an empty prompt".to_string(),
                });
                continue;
            }
            if seen_tags.contains(&config.tag()) {
                outcome.diagnostics.push(Diagnostic {
                    file: self.config_dir.clone(),
                    collection: Some(config.name.clone()),
                    message: format!("tag '{}' already used by another collection", config.tag()),
                });
                continue;
            }
            seen_tags.push(config.tag());
            configs.push(config);
        }

        configs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
        outcome.configs = configs;

        info!(
            enabled = outcome.configs.len(),
            total,
            diagnostics = outcome.diagnostics.len(),
            "collection extraction complete"
        );
        Ok(outcome)
    }

    /// Extract the blocks of one file into `outcome`. Returns the number of
    /// blocks seen (enabled or not).
    fn extract_from_file(&self, path: &Path, content: &str, outcome: &mut ParseOutcome) -> usize {
        let lines: Vec<&str> = content.lines().collect();
        let blocks = find_blocks(&lines);
        let mut rewritten: Option<Vec<String>> = None;
        let mut count = 0;

        for block in &blocks {
            count += 1;
            let name = match find_collection_name(&lines, block.end_line) {
                Some(n) => n,
                None => {
                    outcome.diagnostics.push(Diagnostic {
                        file: path.to_path_buf(),
                        collection: None,
                        message: "could not determine collection name after block".to_string(),
                    });
                    continue;
                }
            };

            let config = parse_block(&name, &lines[block.start_line + 1..block.end_line]);
            debug!(collection = %config.name, enabled = config.enabled, "extracted block");

            if !config.enabled {
                continue;
            }

            // Taglist policy: the host mapping must carry the expected tag.
            match find_taglist_line(&lines, block.end_line) {
                None => {
                    outcome.diagnostics.push(Diagnostic {
                        file: path.to_path_buf(),
                        collection: Some(name.clone()),
                        message: format!(
                            "no radarr_taglist scalar found; expected '{}'",
                            config.tag()
                        ),
                    });
                    continue;
                }
                Some((line_idx, current)) if current != config.tag() => {
                    outcome.diagnostics.push(Diagnostic {
                        file: path.to_path_buf(),
                        collection: Some(name.clone()),
                        message: format!(
                            "radarr_taglist is '{}' but collection tag is '{}'",
                            current,
                            config.tag()
                        ),
                    });
                    if self.fix_tags {
                        let target =
                            rewritten.get_or_insert_with(|| lines.iter().map(|l| l.to_string()).collect());
                        target[line_idx] = rewrite_taglist_line(lines[line_idx], &config.tag());
                        info!(collection = %name, tag = %config.tag(), "fixing radarr_taglist");
                    }
                }
                Some(_) => {}
            }

            outcome.configs.push(config);
        }

        if let Some(new_lines) = rewritten {
            let mut new_content = new_lines.join("\n");
            if content.ends_with('\n') {
                new_content.push('\n');
            }
            if let Err(e) = fs::write(path, new_content) {
                warn!(file = %path.display(), error = %e, "failed to rewrite taglist");
                outcome.diagnostics.push(Diagnostic {
                    file: path.to_path_buf(),
                    collection: None,
                    message: format!("could not rewrite radarr_taglist: {}", e),
                });
            }
        }

        count
    }
}

// ── Block scanning ───────────────────────────────────────────────────────────

struct Block {
    start_line: usize,
    end_line: usize,
}

/// Whether a line is a comment whose content trims to `marker`.
fn is_marker(line: &str, marker: &str) -> bool {
    let trimmed = line.trim();
    match trimmed.strip_prefix('#') {
        Some(rest) => rest.trim() == marker,
        None => false,
    }
}

fn find_blocks(lines: &[&str]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        if is_marker(line, START_MARKER) {
            start = Some(i);
        } else if is_marker(line, END_MARKER) {
            if let Some(s) = start.take() {
                blocks.push(Block {
                    start_line: s,
                    end_line: i,
                });
            }
        }
    }
    blocks
}

/// The collection name is the first non-blank, non-comment line after the
/// end marker, up to the first `:`.
fn find_collection_name(lines: &[&str], end_line: usize) -> Option<String> {
    for line in lines.iter().skip(end_line + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (name, _) = trimmed.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        return Some(trim_quotes(name).to_string());
    }
    None
}

/// Strip one leading `# ` (or bare `#`) from a comment line, preserving
/// any further indentation. Returns `None` for non-comment lines.
fn uncomment(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix('#')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn indent_width(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

/// A `key: value` pair if the line looks like one (single-word key).
fn split_key_value(s: &str) -> Option<(&str, &str)> {
    let (key, value) = s.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim()))
}

/// Parse a block body (the lines between the markers) into a config.
fn parse_block(name: &str, body: &[&str]) -> CollectionConfig {
    let mut config = CollectionConfig::new(name);
    let mut prompt_lines: Vec<String> = Vec::new();
    let mut in_prompt = false;
    let mut base_indent = 0usize;

    for raw in body {
        let cleaned = match uncomment(raw) {
            Some(c) => c,
            None => continue,
        };
        if cleaned.trim().is_empty() {
            if in_prompt {
                prompt_lines.push(String::new());
            }
            continue;
        }

        if in_prompt {
            // A recognized key at the block's base indent ends the prompt,
            // even when the author wrote it after the pipe literal.
            if indent_width(cleaned) <= base_indent {
                if let Some((key, value)) = split_key_value(cleaned) {
                    if RECOGNIZED_KEYS.contains(&key) {
                        in_prompt = false;
                        apply_key(&mut config, key, value, &mut prompt_lines, &mut in_prompt);
                        continue;
                    }
                }
            }
            prompt_lines.push(cleaned.to_string());
            continue;
        }

        if let Some((key, value)) = split_key_value(cleaned) {
            if RECOGNIZED_KEYS.contains(&key) {
                base_indent = indent_width(cleaned);
                apply_key(&mut config, key, value, &mut prompt_lines, &mut in_prompt);
            }
        }
    }

    if !prompt_lines.is_empty() {
        config.prompt = prompt_lines.join("\n").trim_end().to_string();
    }
    config
}

/// Apply a recognized key. `prompt: |` flips the caller into pipe-literal
/// mode; every other key coerces forgivingly, falling back to defaults.
fn apply_key(
    config: &mut CollectionConfig,
    key: &str,
    value: &str,
    prompt_lines: &mut Vec<String>,
    in_prompt: &mut bool,
) {
    match key {
        "enabled" => config.enabled = parse_bool(value),
        "confidence_threshold" => {
            config.confidence_threshold = value.parse().unwrap_or(0.7);
        }
        "priority" => config.priority = value.parse().unwrap_or(0),
        "include_tags" => config.include_tags = parse_list(value),
        "exclude_tags" => config.exclude_tags = parse_list(value),
        "use_iterative_refinement" => config.use_iterative_refinement = parse_bool(value),
        "refinement_threshold" => {
            config.refinement_threshold = value.parse().unwrap_or(0.15);
        }
        "example_inclusions" => config.example_inclusions = parse_list(value),
        "example_exclusions" => config.example_exclusions = parse_list(value),
        "prompt" => {
            if value == "|" {
                prompt_lines.clear();
                *in_prompt = true;
            } else {
                config.prompt = value.to_string();
            }
        }
        _ => {}
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1")
}

/// Comma-separated list, with optional `[ … ]` wrapping and quotes.
fn parse_list(value: &str) -> Vec<String> {
    let inner = value
        .trim()
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(|item| trim_quotes(item.trim()).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn trim_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}

// ── Taglist handling ─────────────────────────────────────────────────────────

/// Locate the `radarr_taglist:` scalar belonging to the collection whose
/// mapping starts right after `end_line`. The search stops at the next
/// mapping key at the collection's indent or shallower.
fn find_taglist_line(lines: &[&str], end_line: usize) -> Option<(usize, String)> {
    let mut name_indent: Option<usize> = None;

    for (offset, line) in lines.iter().enumerate().skip(end_line + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = indent_width(line);
        match name_indent {
            None => {
                // This is the collection-name line itself.
                name_indent = Some(indent);
            }
            Some(base) => {
                if indent <= base {
                    // Next collection (or end of the mapping) reached.
                    return None;
                }
                if let Some((key, value)) = split_key_value(trimmed) {
                    if key == "radarr_taglist" {
                        return Some((offset, trim_quotes(value).to_string()));
                    }
                }
            }
        }
    }
    None
}

/// Replace the scalar value of a `radarr_taglist:` line, leaving the key,
/// indentation, and separator untouched.
fn rewrite_taglist_line(line: &str, tag: &str) -> String {
    match line.find(':') {
        Some(colon) => {
            let head = &line[..colon + 1];
            format!("{} {}", head, tag)
        }
        None => line.to_string(),
    }
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            collect_yaml_files(&path, out)?;
            continue;
        }
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => out.push(path),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # priority: 5
  # confidence_threshold: 0.8
  # exclude_tags: skip-me, manual
  # prompt: |
  #   Identify film noir movies.
  #   - dark, cynical themes
  #   - morally ambiguous protagonists
  # === END KOMETA-AI ===
  Film Noir:
    radarr_taglist: KAI-film-noir
    sort_title: +1_Film Noir
"#;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn parse(dir: &TempDir, fix_tags: bool) -> ParseOutcome {
        KometaParser::new(dir.path(), fix_tags)
            .parse_configs()
            .unwrap()
    }

    #[test]
    fn test_extracts_block() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "noir.yml", SAMPLE);

        let outcome = parse(&dir, false);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        assert_eq!(outcome.configs.len(), 1);

        let config = &outcome.configs[0];
        assert_eq!(config.name, "Film Noir");
        assert!(config.enabled);
        assert_eq!(config.priority, 5);
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.exclude_tags, vec!["skip-me", "manual"]);
        assert!(config.prompt.contains("Identify film noir movies."));
        assert!(config.prompt.contains("- dark, cynical themes"));
        assert_eq!(config.tag(), "KAI-film-noir");
    }

    #[test]
    fn test_key_after_prompt_is_config_not_prompt() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "mixed.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # prompt: |
  #   Heist movies only.
  #   - elaborate robberies
  # confidence_threshold: 0.9
  # === END KOMETA-AI ===
  Heists:
    radarr_taglist: KAI-heists
"#,
        );

        let outcome = parse(&dir, false);
        assert_eq!(outcome.configs.len(), 1);
        let config = &outcome.configs[0];
        assert_eq!(config.confidence_threshold, 0.9);
        assert!(!config.prompt.contains("confidence_threshold"));
        assert!(config.prompt.contains("- elaborate robberies"));
    }

    #[test]
    fn test_refinement_and_exemplar_keys() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "refine.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # use_iterative_refinement: yes
  # refinement_threshold: 0.2
  # include_tags: curated
  # example_inclusions: Double Indemnity, The Maltese Falcon
  # example_exclusions: Toy Story
  # prompt: |
  #   Classic film noir.
  # === END KOMETA-AI ===
  Film Noir:
    radarr_taglist: KAI-film-noir
"#,
        );

        let outcome = parse(&dir, false);
        assert_eq!(outcome.configs.len(), 1);
        let config = &outcome.configs[0];
        assert!(config.use_iterative_refinement);
        assert_eq!(config.refinement_threshold, 0.2);
        assert_eq!(config.include_tags, vec!["curated"]);
        assert_eq!(
            config.example_inclusions,
            vec!["Double Indemnity", "The Maltese Falcon"]
        );
        assert_eq!(config.example_exclusions, vec!["Toy Story"]);
    }

    #[test]
    fn test_unparsable_numbers_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "bad.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # confidence_threshold: very high
  # priority: first
  # prompt: Anything.
  # === END KOMETA-AI ===
  Sloppy:
    radarr_taglist: KAI-sloppy
"#,
        );

        let outcome = parse(&dir, false);
        assert_eq!(outcome.configs.len(), 1);
        assert_eq!(outcome.configs[0].confidence_threshold, 0.7);
        assert_eq!(outcome.configs[0].priority, 0);
    }

    #[test]
    fn test_disabled_block_is_skipped() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "off.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: false
  # prompt: Anything at all.
  # === END KOMETA-AI ===
  Disabled One:
    radarr_taglist: KAI-disabled-one
"#,
        );
        let outcome = parse(&dir, false);
        assert!(outcome.configs.is_empty());
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_enabled_without_prompt_is_diagnosed() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "noprompt.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # === END KOMETA-AI ===
  Empty:
    radarr_taglist: KAI-empty
"#,
        );
        let outcome = parse(&dir, false);
        assert!(outcome.configs.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].message.contains("empty prompt"));
    }

    #[test]
    fn test_missing_taglist_skips_collection() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "plex.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # prompt: Space movies.
  # === END KOMETA-AI ===
  Space:
    plex_search:
      all:
        genre: Science Fiction
"#,
        );
        let outcome = parse(&dir, false);
        assert!(outcome.configs.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].message.contains("radarr_taglist"));
    }

    #[test]
    fn test_taglist_mismatch_diagnosed_without_fix() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "wrong.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # prompt: Westerns.
  # === END KOMETA-AI ===
  Westerns:
    radarr_taglist: KAI-western
"#,
        );
        let before = fs::read_to_string(&path).unwrap();
        let outcome = parse(&dir, false);
        assert_eq!(outcome.configs.len(), 1);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].message.contains("KAI-westerns"));
        // Without fix-tags the file is untouched.
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_taglist_mismatch_fixed_in_place() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "wrong.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # prompt: Westerns.
  # === END KOMETA-AI ===
  Westerns:
    radarr_taglist: KAI-western
    sort_title: +2_Westerns
"#,
        );
        let outcome = parse(&dir, true);
        assert_eq!(outcome.configs.len(), 1);

        let after = fs::read_to_string(&path).unwrap();
        assert!(after.contains("    radarr_taglist: KAI-westerns"));
        // Every other byte survives, including the trailing newline.
        assert!(after.contains("sort_title: +2_Westerns"));
        assert!(after.contains("# prompt: Westerns."));
        assert!(after.ends_with('\n'));
    }

    #[test]
    fn test_priority_ordering() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "many.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # priority: 1
  # prompt: B movies.
  # === END KOMETA-AI ===
  Beta:
    radarr_taglist: KAI-beta
  # === KOMETA-AI ===
  # enabled: true
  # priority: 9
  # prompt: A movies.
  # === END KOMETA-AI ===
  Alpha:
    radarr_taglist: KAI-alpha
  # === KOMETA-AI ===
  # enabled: true
  # priority: 9
  # prompt: Z movies.
  # === END KOMETA-AI ===
  Zeta:
    radarr_taglist: KAI-zeta
"#,
        );
        let outcome = parse(&dir, false);
        let names: Vec<&str> = outcome.configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta", "Beta"]);
    }

    #[test]
    fn test_duplicate_tag_diagnosed() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "dup.yml",
            r#"collections:
  # === KOMETA-AI ===
  # enabled: true
  # prompt: First.
  # === END KOMETA-AI ===
  Film Noir:
    radarr_taglist: KAI-film-noir
  # === KOMETA-AI ===
  # enabled: true
  # prompt: Second.
  # === END KOMETA-AI ===
  film noir:
    radarr_taglist: KAI-film-noir
"#,
        );
        let outcome = parse(&dir, false);
        assert_eq!(outcome.configs.len(), 1);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.message.contains("already used")));
    }

    #[test]
    fn test_skips_underscore_and_dot_files() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "_template.yml", SAMPLE);
        write_config(&dir, ".hidden.yml", SAMPLE);
        write_config(&dir, "real.yml", SAMPLE);

        let parser = KometaParser::new(dir.path(), false);
        let files = parser.find_config_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("real.yml"));
    }

    #[test]
    fn test_inline_list_syntax() {
        assert_eq!(parse_list("[a, b]"), vec!["a", "b"]);
        assert_eq!(parse_list("a, b , c"), vec!["a", "b", "c"]);
        assert_eq!(parse_list("\"quoted\", 'single'"), vec!["quoted", "single"]);
        assert!(parse_list("").is_empty());
    }
}
