use super::outcome::{parse_literal, CellValue, QueryOutcome, RowSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Empty,
    NonEmpty,
}

/// Only a row set with at least one row counts as data. Errors are never data.
pub fn classify(outcome: &QueryOutcome) -> Classification {
    match outcome {
        QueryOutcome::Rows(rows) if !rows.is_empty() => Classification::NonEmpty,
        _ => Classification::Empty,
    }
}

/// Classifies the textual form of a result. Blank text, `[]` and anything
/// that does not parse as a tuple list are all EMPTY.
pub fn classify_raw(raw: Option<&str>) -> Classification {
    let Some(text) = raw.map(str::trim) else {
        return Classification::Empty;
    };
    if text.is_empty() || text == "[]" {
        return Classification::Empty;
    }
    match parse_literal(text) {
        Ok(rows) if !rows.is_empty() => Classification::NonEmpty,
        _ => Classification::Empty,
    }
}

const CONTACT_COLUMNS: [&str; 2] = ["nombre_referencia", "numero_anexo"];
const LOCATION_COLUMNS: [&str; 3] = ["nombre_unidad", "nombre_piso", "nombre_edificio"];

/// Bulleted rendering of the rows, one line per row, keyed by column name.
pub fn to_display_form(rows: &RowSet) -> String {
    let lines: Vec<String> = if rows.has_columns(&CONTACT_COLUMNS) {
        rows.rows.iter().map(|row| contact_line(rows, row)).collect()
    } else if rows.has_columns(&LOCATION_COLUMNS) {
        rows.rows.iter().map(|row| location_line(rows, row)).collect()
    } else if !rows.columns.is_empty() {
        rows.rows.iter().map(|row| keyed_line(rows, row)).collect()
    } else {
        rows.rows.iter().map(|row| positional_line(row)).collect()
    };
    lines.join("\n")
}

/// Display form for a raw tuple-list text; `None` when it does not parse.
pub fn raw_to_display_form(raw: &str) -> Option<String> {
    parse_literal(raw.trim()).ok().map(|rows| to_display_form(&rows))
}

fn cell<'a>(rows: &RowSet, row: &'a [CellValue], column: &str) -> Option<&'a CellValue> {
    rows.column_index(column).and_then(|i| row.get(i))
}

fn cell_text(rows: &RowSet, row: &[CellValue], column: &str) -> String {
    cell(rows, row, column).map(ToString::to_string).unwrap_or_default()
}

fn contact_line(rows: &RowSet, row: &[CellValue]) -> String {
    let mut line = format!(
        "- {}: anexo {}",
        cell_text(rows, row, "nombre_referencia"),
        cell_text(rows, row, "numero_anexo")
    );
    if let Some(location) = cell(rows, row, "ubicacion") {
        if !matches!(location, CellValue::Null) && !location.to_string().trim().is_empty() {
            line.push_str(&format!(" ({})", location));
        }
    }
    line
}

fn location_line(rows: &RowSet, row: &[CellValue]) -> String {
    format!(
        "- {}: {}, {}",
        cell_text(rows, row, "nombre_unidad"),
        cell_text(rows, row, "nombre_piso"),
        cell_text(rows, row, "nombre_edificio")
    )
}

fn keyed_line(rows: &RowSet, row: &[CellValue]) -> String {
    let parts: Vec<String> = rows
        .columns
        .iter()
        .zip(row.iter())
        .map(|(column, value)| format!("{}: {}", column, value))
        .collect();
    format!("- {}", parts.join(" | "))
}

fn positional_line(row: &[CellValue]) -> String {
    let parts: Vec<String> = row.iter().map(ToString::to_string).collect();
    format!("- {}", parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[rstest]
    #[case(None, Classification::Empty)]
    #[case(Some(""), Classification::Empty)]
    #[case(Some("   \n"), Classification::Empty)]
    #[case(Some("[]"), Classification::Empty)]
    #[case(Some(" [ ] "), Classification::Empty)]
    #[case(Some("Error: relation \"x\" does not exist"), Classification::Empty)]
    #[case(Some("[('A', 1)"), Classification::Empty)]
    #[case(Some("[('A', 1)]"), Classification::NonEmpty)]
    #[case(Some("[(None,)]"), Classification::NonEmpty)]
    fn test_classify_raw(#[case] raw: Option<&str>, #[case] expected: Classification) {
        assert_eq!(classify_raw(raw), expected);
    }

    #[test]
    fn test_deeply_nested_raw_result_is_empty() {
        let raw = format!("[({}", "f(".repeat(200_000));
        assert_eq!(classify_raw(Some(&raw)), Classification::Empty);
    }

    #[test]
    fn test_classify_outcomes() {
        let empty = QueryOutcome::Rows(RowSet::new(vec!["a".into()], vec![]));
        let full = QueryOutcome::Rows(RowSet::new(vec!["a".into()], vec![vec![CellValue::Integer(1)]]));
        let failed = QueryOutcome::ExecutionError("boom".into());
        assert_eq!(classify(&empty), Classification::Empty);
        assert_eq!(classify(&full), Classification::NonEmpty);
        assert_eq!(classify(&failed), Classification::Empty);
    }

    #[test]
    fn test_contact_rows_by_name_not_position() {
        // Columns deliberately out of the usual order.
        let rows = RowSet::new(
            vec!["ubicacion".into(), "numero_anexo".into(), "nombre_referencia".into()],
            vec![
                vec![text("Edificio A"), CellValue::Integer(4410), text("Farmacia Central")],
                vec![CellValue::Null, CellValue::Integer(4411), text("Dr. Vargas")],
            ],
        );
        assert_eq!(
            to_display_form(&rows),
            "- Farmacia Central: anexo 4410 (Edificio A)\n- Dr. Vargas: anexo 4411"
        );
    }

    #[test]
    fn test_location_rows() {
        let rows = RowSet::new(
            vec!["NOMBRE_EDIFICIO".into(), "nombre_unidad".into(), "nombre_piso".into()],
            vec![vec![text("Edificio B (Beta)"), text("Cafetería"), text("Piso 2")]],
        );
        assert_eq!(to_display_form(&rows), "- Cafetería: Piso 2, Edificio B (Beta)");
    }

    #[test]
    fn test_other_shapes_are_keyed() {
        let rows = RowSet::new(
            vec!["ubicacion".into(), "tiempo_espera_minutos".into()],
            vec![vec![text("Piso 1, Ala Norte"), CellValue::Integer(45)]],
        );
        assert_eq!(
            to_display_form(&rows),
            "- ubicacion: Piso 1, Ala Norte | tiempo_espera_minutos: 45"
        );
    }

    #[test]
    fn test_raw_rows_render_positionally() {
        assert_eq!(
            raw_to_display_form("[('Farmacia', 'Piso 1'), ('UCI', None)]").as_deref(),
            Some("- Farmacia | Piso 1\n- UCI | -")
        );
        assert_eq!(raw_to_display_form("not a list"), None);
    }
}
