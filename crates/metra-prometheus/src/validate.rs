use std::collections::{BTreeSet, HashSet};

use crate::error::ExporterError;

/// Series identifiers (`name{labels}`) that appear on more than one sample line of `text`.
///
/// Comment and blank lines are ignored. The result is sorted and free of repeats.
pub fn find_duplicate_series(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dupes = BTreeSet::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(series) = series_of(line) else {
            continue;
        };
        if !seen.insert(series) {
            dupes.insert(series.to_string());
        }
    }
    dupes.into_iter().collect()
}

/// Fail with [`ExporterError::DuplicateSeries`] when `text` repeats any series.
pub fn ensure_unique_series(text: &str) -> Result<(), ExporterError> {
    let duplicates = find_duplicate_series(text);
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ExporterError::DuplicateSeries(duplicates))
    }
}

fn series_of(line: &str) -> Option<&str> {
    match (line.find('{'), line.rfind('}')) {
        (Some(open), Some(close)) if open < close => Some(&line[..=close]),
        _ => line.split_whitespace().next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exposition_has_no_duplicates() {
        let text = "\
# HELP a_total a
# TYPE a_total counter
a_total{status=\"200\"} 1
a_total{status=\"500\"} 2
b 3
";
        assert!(find_duplicate_series(text).is_empty());
    }

    #[test]
    fn reports_each_duplicate_once() {
        let text = "\
a_total{status=\"200\"} 1
b 3
a_total{status=\"200\"} 4
b 5
b 6
";
        assert_eq!(
            find_duplicate_series(text),
            vec!["a_total{status=\"200\"}".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn repeated_series_is_a_typed_error() {
        assert!(ensure_unique_series("a 1\nb 2\n").is_ok());

        let err = ensure_unique_series("a 1\na 2\n").unwrap_err();
        assert!(matches!(&err, ExporterError::DuplicateSeries(d) if d == &vec!["a".to_string()]));
        assert_eq!(err.to_string(), "duplicate series in exposition: a");
    }

    #[test]
    fn label_values_with_spaces_are_one_series() {
        let text = "m{path=\"/a b\"} 1\nm{path=\"/a c\"} 1\n";
        assert!(find_duplicate_series(text).is_empty());
    }
}
