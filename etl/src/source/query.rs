use std::fmt;

/// What to read from a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractQuery {
    /// Every row of the table.
    Full { table: String },
    /// Rows whose primary key is strictly greater than `after`, in ascending key order.
    Incremental {
        table: String,
        primary_key: String,
        after: i64,
    },
}

impl ExtractQuery {
    pub fn table(&self) -> &str {
        match self {
            ExtractQuery::Full { table } | ExtractQuery::Incremental { table, .. } => table,
        }
    }

    /// Returns the MySQL statement. Incremental queries take `after` as their only bind.
    pub fn to_sql(&self) -> String {
        match self {
            ExtractQuery::Full { table } => format!("select * from {}", quote_identifier(table)),
            ExtractQuery::Incremental {
                table, primary_key, ..
            } => {
                let primary_key = quote_identifier(primary_key);
                format!(
                    "select * from {} where {primary_key} > ? order by {primary_key} asc",
                    quote_identifier(table)
                )
            }
        }
    }
}

impl fmt::Display for ExtractQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractQuery::Full { table } => write!(f, "full extract of {table}"),
            ExtractQuery::Incremental {
                table,
                primary_key,
                after,
            } => write!(f, "incremental extract of {table} where {primary_key} > {after}"),
        }
    }
}

/// Quotes a MySQL identifier with backticks, doubling any backtick inside it.
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn full_query() {
        let query = ExtractQuery::Full {
            table: "products".to_owned(),
        };

        assert_snapshot!(query.to_sql(), @"select * from `products`");
    }

    #[test]
    fn incremental_query() {
        let query = ExtractQuery::Incremental {
            table: "orders".to_owned(),
            primary_key: "order_id".to_owned(),
            after: 5,
        };

        assert_snapshot!(
            query.to_sql(),
            @"select * from `orders` where `order_id` > ? order by `order_id` asc"
        );
        assert_eq!(query.table(), "orders");
    }

    #[test]
    fn identifiers_cannot_break_out_of_quotes() {
        assert_snapshot!(quote_identifier("odd`name"), @"`odd``name`");
    }
}
