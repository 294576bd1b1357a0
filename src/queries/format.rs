use sqlformat::{FormatOptions, Indent, QueryParams};

/// Reindents a stored query and upper-cases its keywords for display.
pub fn pretty_sql(sql: &str) -> String {
    let options = FormatOptions {
        indent: Indent::Spaces(2),
        uppercase: true,
        lines_between_queries: 1,
    };
    sqlformat::format(sql, &QueryParams::None, options)
}
