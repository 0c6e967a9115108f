//! JSON Lines manifest, one link per line.
//!
//! ```text
//! {"loc": "/shop/widget/", "priority": 0.8, "changefreq": "weekly", "sku": "W-1"}
//! {"id": "gadget", "loc": "/shop/gadget/", "language": "fr", "lastmod": "2024-05-01"}
//! ```
//!
//! Recognized keys: `loc` (required), `id`, `priority`, `changefreq`,
//! `language`, `lastmod` (unix seconds or `YYYY-MM-DD[THH:MM:SSZ]`) and
//! `visible`. Every other key is kept in the link's extension payload.
//! Blank lines are skipped; a line without `id` is identified by its number.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Enumerated, LinkProvider};
use crate::config::SourceConfig;
use crate::core::{
    ChangeFreq, EnumerationError, InfrastructureError, LANGUAGE_NEUTRAL, Link, LinkExtension,
    Priority,
};
use crate::utils::date::DateTimeUtc;

pub struct ManifestProvider {
    link_type: String,
    path: PathBuf,
    priority: Priority,
    changefreq: ChangeFreq,
    language: Option<String>,
    /// Non-blank lines with their 1-based line numbers.
    lines: Mutex<Option<Arc<Vec<(usize, String)>>>>,
}

impl ManifestProvider {
    pub fn from_config(source: &SourceConfig) -> Self {
        Self {
            link_type: source.link_type.clone(),
            path: source.path.clone(),
            priority: Priority::new(source.priority).unwrap_or(Priority::DEFAULT),
            changefreq: source.changefreq,
            language: source.language.clone(),
            lines: Mutex::new(None),
        }
    }

    fn lines(&self) -> Result<Arc<Vec<(usize, String)>>, InfrastructureError> {
        let mut cached = self.lines.lock();
        if let Some(lines) = cached.as_ref() {
            return Ok(Arc::clone(lines));
        }

        let content = fs::read_to_string(&self.path).map_err(|e| InfrastructureError::Provider {
            link_type: self.link_type.clone(),
            message: format!("cannot read `{}`: {e}", self.path.display()),
        })?;
        let lines: Vec<_> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (i + 1, line.to_string()))
            .collect();

        let lines = Arc::new(lines);
        *cached = Some(Arc::clone(&lines));
        Ok(lines)
    }

    fn parse_line(&self, number: usize, line: &str) -> Enumerated {
        let line_id = format!("line {number}");
        let fail = |id: &str, message: String| EnumerationError::new(&self.link_type, id, message);

        let mut fields: Map<String, Value> = match serde_json::from_str(line) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(fail(&line_id, "expected a JSON object".into())),
            Err(e) => return Err(fail(&line_id, format!("invalid JSON: {e}"))),
        };

        let source_id = match fields.remove("id") {
            None => line_id.clone(),
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => return Err(fail(&line_id, "`id` must be a string or number".into())),
        };
        let fail = |message: String| fail(&source_id, message);

        let loc = match fields.remove("loc") {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(_) => return Err(fail("`loc` must be a non-empty string".into())),
            None => return Err(fail("missing `loc`".into())),
        };

        let priority = match fields.remove("priority") {
            None => self.priority,
            Some(value) => value
                .as_f64()
                .ok_or_else(|| "`priority` must be a number".to_string())
                .and_then(|p| Priority::new(p).map_err(|e| e.to_string()))
                .map_err(&fail)?,
        };

        let changefreq = match fields.remove("changefreq") {
            None => self.changefreq,
            Some(Value::String(s)) => s
                .parse::<ChangeFreq>()
                .map_err(|e| fail(e.to_string()))?,
            Some(_) => return Err(fail("`changefreq` must be a string".into())),
        };

        let language = match fields.remove("language") {
            None => self
                .language
                .clone()
                .unwrap_or_else(|| LANGUAGE_NEUTRAL.to_string()),
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(_) => return Err(fail("`language` must be a non-empty string".into())),
        };

        let lastmod = match fields.remove("lastmod") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(
                n.as_i64()
                    .ok_or_else(|| fail("`lastmod` must be whole seconds".into()))?,
            ),
            Some(Value::String(s)) => Some(
                DateTimeUtc::parse(&s)
                    .map(DateTimeUtc::to_unix)
                    .ok_or_else(|| fail(format!("unrecognized `lastmod` date `{s}`")))?,
            ),
            Some(_) => return Err(fail("`lastmod` must be a number or date string".into())),
        };

        let visible = match fields.remove("visible") {
            None => true,
            Some(Value::Bool(b)) => b,
            Some(_) => return Err(fail("`visible` must be a boolean".into())),
        };

        let mut link = Link::new(&self.link_type, source_id.clone(), loc)
            .with_priority(priority)
            .with_changefreq(changefreq)
            .with_language(language)
            .with_lastmod(lastmod)
            .with_extension(LinkExtension::Entry { fields });
        link.visible = visible;
        Ok(link)
    }
}

impl LinkProvider for ManifestProvider {
    fn link_type(&self) -> &str {
        &self.link_type
    }

    fn count(&self) -> Result<u64, InfrastructureError> {
        Ok(self.lines()?.len() as u64)
    }

    fn enumerate(&self, offset: u64, limit: usize) -> Result<Vec<Enumerated>, InfrastructureError> {
        let lines = self.lines()?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(lines
            .iter()
            .skip(start)
            .take(limit)
            .map(|(number, line)| self.parse_line(*number, line))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn manifest(dir: &Path, content: &str) -> ManifestProvider {
        let path = dir.join("catalog.jsonl");
        fs::write(&path, content).unwrap();
        ManifestProvider::from_config(&SourceConfig {
            link_type: "catalog".into(),
            path,
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_full_entry() {
        let dir = TempDir::new().unwrap();
        let provider = manifest(
            dir.path(),
            r#"{"id": "w1", "loc": "/shop/widget/", "priority": 0.8, "changefreq": "Weekly", "language": "fr", "lastmod": "2024-05-01", "sku": "W-1"}"#,
        );

        let link = provider.enumerate(0, 10).unwrap().remove(0).unwrap();
        assert_eq!(link.source_id, "w1");
        assert_eq!(link.priority.get(), 0.8);
        assert_eq!(link.changefreq, ChangeFreq::Weekly);
        assert_eq!(link.language, "fr");
        assert_eq!(link.lastmod, Some(1_714_521_600));
        let LinkExtension::Entry { fields } = link.extension else {
            panic!("expected entry extension");
        };
        assert_eq!(fields.get("sku"), Some(&Value::String("W-1".into())));
        assert!(!fields.contains_key("loc"));
    }

    #[test]
    fn test_defaults_and_line_ids() {
        let dir = TempDir::new().unwrap();
        let provider = manifest(dir.path(), "\n{\"loc\": \"/a/\"}\n\n{\"loc\": \"/b/\", \"visible\": false}\n");
        assert_eq!(provider.count().unwrap(), 2);

        let links: Vec<_> = provider
            .enumerate(0, 10)
            .unwrap()
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(links[0].source_id, "line 2");
        assert_eq!(links[0].language, LANGUAGE_NEUTRAL);
        assert_eq!(links[0].priority, Priority::DEFAULT);
        assert_eq!(links[1].source_id, "line 4");
        assert!(!links[1].visible);
    }

    #[test]
    fn test_bad_lines_become_record_errors() {
        let dir = TempDir::new().unwrap();
        let provider = manifest(
            dir.path(),
            "{\"loc\": \"/ok/\"}\nnot json\n{\"id\": \"x\", \"priority\": 3, \"loc\": \"/x/\"}\n[1]\n{\"id\": \"y\"}",
        );

        let results = provider.enumerate(0, 10).unwrap();
        assert!(results[0].is_ok());

        let errors: Vec<_> = results[1..].iter().map(|r| r.clone().unwrap_err()).collect();
        assert_eq!(errors[0].source_id, "line 2");
        assert!(errors[0].message.starts_with("invalid JSON"));
        assert_eq!(errors[1].source_id, "x");
        assert!(errors[1].message.contains("priority"));
        assert_eq!(errors[2].message, "expected a JSON object");
        assert_eq!(errors[3].message, "missing `loc`");
    }

    #[test]
    fn test_missing_file_is_infrastructure_error() {
        let dir = TempDir::new().unwrap();
        let provider = ManifestProvider::from_config(&SourceConfig {
            link_type: "catalog".into(),
            path: dir.path().join("missing.jsonl"),
            ..Default::default()
        });
        assert!(matches!(
            provider.enumerate(0, 1),
            Err(InfrastructureError::Provider { .. })
        ));
    }
}
