// Primitives for reading CSV files.

use csv::ReaderBuilder;

use crate::dash::*;

const BOM: char = '\u{feff}';

/// Parses the text of a CSV file with a header line into loose rows.
///
/// Quoted fields may contain commas and doubled quotes. A quote inside an
/// unquoted field is kept as it is. Records shorter than
/// the header get `Field::Missing` for the trailing columns; extra trailing
/// fields are dropped.
pub fn parse_csv_text(location: &str, text: &str) -> DashResult<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .context(CsvParseSnafu { resource: location })?
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let h = if idx == 0 { h.trim_start_matches(BOM) } else { h };
            h.trim().to_string()
        })
        .collect();
    debug!("parse_csv_text: {}: headers {:?}", location, headers);

    let mut rows: Vec<Row> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvParseSnafu { resource: location })?;
        if line.len() > headers.len() {
            debug!(
                "parse_csv_text: {}: line {} has {} fields for {} columns",
                location,
                lineno,
                line.len(),
                headers.len()
            );
        }
        let mut row = Row::new();
        for (col, name) in headers.iter().enumerate() {
            let field = line.get(col).map(Field::coerce).unwrap_or(Field::Missing);
            row.push(name, field);
        }
        rows.push(row);
    }
    Ok(Table { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_their_commas() {
        let t = parse_csv_text("c.csv", "name,age\n\"Smith, John\",42\n").unwrap();
        assert_eq!(t.headers, vec!["name", "age"]);
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].get("name"), &Field::Text("Smith, John".to_string()));
        assert_eq!(t.rows[0].get("age"), &Field::Number(42.0));
    }

    #[test]
    fn doubled_quotes_are_unescaped() {
        let t = parse_csv_text("c.csv", "name\n\"The \"\"Wharf\"\"\"\n").unwrap();
        assert_eq!(
            t.rows[0].get("name"),
            &Field::Text("The \"Wharf\"".to_string())
        );
    }

    #[test]
    fn quotes_inside_unquoted_fields_are_literal() {
        let t = parse_csv_text("c.csv", "name,age\nab\"c,d\"e,7\n").unwrap();
        assert_eq!(t.rows[0].get("name"), &Field::Text("ab\"c".to_string()));
        assert_eq!(t.rows[0].get("age"), &Field::Text("d\"e".to_string()));
    }

    #[test]
    fn blank_and_non_numeric_fields_stay_text() {
        let t = parse_csv_text("c.csv", "a,b,c\n,N/A, 3.5 \n").unwrap();
        assert_eq!(t.rows[0].get("a"), &Field::Text("".to_string()));
        assert_eq!(t.rows[0].get("b"), &Field::Text("N/A".to_string()));
        assert_eq!(t.rows[0].get("c"), &Field::Number(3.5));
    }

    #[test]
    fn short_rows_have_missing_fields() {
        let t = parse_csv_text("c.csv", "a,b,c\n1,2\n4,5,6,7\n").unwrap();
        assert_eq!(t.rows[0].get("c"), &Field::Missing);
        assert_eq!(t.rows[1].get("c"), &Field::Number(6.0));
        assert_eq!(t.rows[1].len(), 3);
    }

    #[test]
    fn bom_and_padding_are_stripped_from_headers() {
        let t = parse_csv_text("c.csv", "\u{feff}year , budgetary_impact_bn\n2029,2.8\n").unwrap();
        assert_eq!(t.headers, vec!["year", "budgetary_impact_bn"]);
        assert_eq!(t.rows[0].get("year"), &Field::Number(2029.0));
    }

    #[test]
    fn empty_text_has_no_header() {
        let t = parse_csv_text("c.csv", "").unwrap();
        assert!(t.headers.is_empty());
        assert!(t.rows.is_empty());
    }
}
