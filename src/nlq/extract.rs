use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```[ \t]*sql\b(.*?)```").expect("valid sql fence pattern"));

static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid fence pattern"));

// A language tag is a single word alone on the opening line.
static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_+-]*)[ \t]*\r?\n").expect("valid language tag pattern")
});

// Opening-line words that start the statement rather than name a language.
const SQL_LEADING_KEYWORDS: &[&str] = &["select", "with"];

static SELECT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)select").expect("valid select pattern"));

/// Which rule produced the extracted statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    SqlFence,
    Fence,
    InlineSelect,
    Raw,
}

/// Carves a single statement out of a raw completion.
///
/// Rules, first match wins: a fenced block tagged `sql`, any fenced block,
/// the text from the first `SELECT` to the first `;` (or closing fence, or
/// end), and finally the trimmed input. Trailing semicolons are always
/// removed. This is a shape extractor, not a validator.
pub fn extract_sql(raw: &str) -> String {
    extract_sql_with_source(raw).0
}

pub fn extract_sql_with_source(raw: &str) -> (String, ExtractionSource) {
    let (body, source) = if let Some(caps) = SQL_FENCE.captures(raw) {
        (caps.get(1).map_or("", |m| m.as_str()), ExtractionSource::SqlFence)
    } else if let Some(caps) = ANY_FENCE.captures(raw) {
        let interior = caps.get(1).map_or("", |m| m.as_str());
        (strip_language_tag(interior), ExtractionSource::Fence)
    } else if let Some(m) = SELECT_KEYWORD.find(raw) {
        let tail = &raw[m.start()..];
        let end = [tail.find(';'), tail.find("```")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(tail.len());
        (&tail[..end], ExtractionSource::InlineSelect)
    } else {
        (raw, ExtractionSource::Raw)
    };

    let sql = strip_trailing_semicolons(body);
    debug!(?source, "Extracted SQL: {}", sql);
    (sql, source)
}

fn strip_language_tag(interior: &str) -> &str {
    match LANGUAGE_TAG.captures(interior) {
        Some(caps) => {
            let tag = caps.get(1).map_or("", |m| m.as_str());
            if SQL_LEADING_KEYWORDS.iter().any(|k| tag.eq_ignore_ascii_case(k)) {
                interior
            } else {
                &interior[caps.get(0).map_or(0, |m| m.end())..]
            }
        }
        None => interior,
    }
}

fn strip_trailing_semicolons(text: &str) -> String {
    let mut s = text.trim();
    while let Some(rest) = s.strip_suffix(';') {
        s = rest.trim_end();
    }
    s.trim_start().to_string()
}

/// Validity gate used before anything reaches the database.
pub fn contains_select(sql: &str) -> bool {
    SELECT_KEYWORD.is_match(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_sql_fence_wins_over_later_blocks() {
        let raw = "Claro:\n```SQL\nSELECT nombre FROM areas;\n```\nO bien:\n```sql\nSELECT 2\n```";
        let (sql, source) = extract_sql_with_source(raw);
        assert_eq!(sql, "SELECT nombre FROM areas");
        assert_eq!(source, ExtractionSource::SqlFence);
    }

    #[test]
    fn test_sql_fence_preferred_over_earlier_plain_fence() {
        let raw = "```\nnot this\n```\n```sql\nSELECT 1\n```";
        assert_eq!(extract_sql(raw), "SELECT 1");
    }

    #[test]
    fn test_sqlite_tag_is_not_sql_tag() {
        let raw = "```sqlite\nSELECT * FROM pacientes\n```";
        let (sql, source) = extract_sql_with_source(raw);
        assert_eq!(sql, "SELECT * FROM pacientes");
        assert_eq!(source, ExtractionSource::Fence);
    }

    #[rstest]
    #[case("```\n  SELECT a FROM b;  \n```", "SELECT a FROM b")]
    #[case("```SELECT 1```", "SELECT 1")]
    #[case("```postgresql\nSELECT 1\n```", "SELECT 1")]
    #[case("```SELECT\nnombre FROM areas\n```", "SELECT\nnombre FROM areas")]
    #[case("```with\nx AS (SELECT 1) SELECT * FROM x\n```", "with\nx AS (SELECT 1) SELECT * FROM x")]
    fn test_generic_fence(#[case] raw: &str, #[case] expected: &str) {
        let (sql, source) = extract_sql_with_source(raw);
        assert_eq!(sql, expected);
        assert_eq!(source, ExtractionSource::Fence);
    }

    #[rstest]
    #[case(
        "Here you go: select nombre_unidad FROM vista_ubicaciones_maestra; hope it helps",
        "select nombre_unidad FROM vista_ubicaciones_maestra"
    )]
    #[case("SQL: SELECT ubicacion FROM areas", "SELECT ubicacion FROM areas")]
    #[case("SELECT 1\n```", "SELECT 1")]
    #[case("SeLeCt a;;; SELECT b;", "SeLeCt a")]
    fn test_inline_select(#[case] raw: &str, #[case] expected: &str) {
        let (sql, source) = extract_sql_with_source(raw);
        assert_eq!(sql, expected);
        assert_eq!(source, ExtractionSource::InlineSelect);
    }

    #[test]
    fn test_raw_fallback_is_trimmed_input() {
        let (sql, source) = extract_sql_with_source("  I cannot help with that.  ");
        assert_eq!(sql, "I cannot help with that.");
        assert_eq!(source, ExtractionSource::Raw);
        assert!(!contains_select(&sql));
    }

    #[rstest]
    #[case("```sql\nSELECT 1;;\n```")]
    #[case("```\nSELECT 1 ; \n```")]
    #[case("DROP TABLE x;")]
    #[case(";")]
    fn test_never_ends_with_semicolon(#[case] raw: &str) {
        assert!(!extract_sql(raw).ends_with(';'));
    }

    #[test]
    fn test_empty_sql_fence_yields_empty() {
        assert_eq!(extract_sql("```sql\n```"), "");
    }

    #[rstest]
    #[case("SELECT 1", true)]
    #[case("with x as (select 1) select * from x", true)]
    #[case("DELETE FROM pacientes", false)]
    #[case("", false)]
    fn test_contains_select(#[case] sql: &str, #[case] expected: bool) {
        assert_eq!(contains_select(sql), expected);
    }
}
