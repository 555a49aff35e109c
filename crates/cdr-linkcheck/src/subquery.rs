//! SQL generation from compiled rules.
//!
//! Picklists show the documents a link field may point at. Rules attached to
//! the link type narrow that list, so they are turned into SQL predicates
//! over the query-term index. Every relation becomes its own `EXISTS`
//! subquery rather than a self join of the index table; large self joins of
//! that table defeat the query planner.

use cdr_linkrule::{Connector, Relation, RuleNode};

use crate::descriptor::LinkTypeId;

/// Writes rule trees as SQL boolean expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubqueryGenerator {
    table: String,
    alias: String,
    doc_column: String,
    path_column: String,
    value_column: String,
}

impl Default for SubqueryGenerator {
    fn default() -> Self {
        Self {
            table: "query_term".into(),
            alias: "qt".into(),
            doc_column: "doc_id".into(),
            path_column: "path".into(),
            value_column: "value".into(),
        }
    }
}

impl SubqueryGenerator {
    /// Creates a generator for the default `query_term` table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different index table and alias.
    pub fn with_table(mut self, table: impl Into<String>, alias: impl Into<String>) -> Self {
        self.table = table.into();
        self.alias = alias.into();
        self
    }

    /// Uses different column names for document id, path and value.
    pub fn with_columns(
        mut self,
        doc_column: impl Into<String>,
        path_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        self.doc_column = doc_column.into();
        self.path_column = path_column.into();
        self.value_column = value_column.into();
        self
    }

    /// Renders `node` as a predicate on the document id in `target_id_column`.
    ///
    /// `target_id_column` is emitted verbatim; tags and values are emitted as
    /// quoted SQL literals.
    pub fn to_sql_predicate(&self, node: &RuleNode, target_id_column: &str) -> String {
        let mut sql = String::new();
        self.write_node(node, target_id_column, &mut sql);
        sql
    }

    fn write_node(&self, node: &RuleNode, column: &str, sql: &mut String) {
        match node {
            RuleNode::Relation(relation) => self.write_relation(relation, column, sql),
            RuleNode::Pair(pair) => {
                sql.push('(');
                self.write_node(&pair.left, column, sql);
                if let Some(right) = &pair.right {
                    sql.push_str(match pair.connector {
                        Connector::And => " AND ",
                        Connector::Or => " OR ",
                        Connector::AndNot => " AND NOT ",
                    });
                    self.write_node(right, column, sql);
                }
                sql.push(')');
            }
        }
    }

    fn write_relation(&self, relation: &Relation, column: &str, sql: &mut String) {
        let alias = &self.alias;
        if relation.relator.is_negated() {
            sql.push_str("NOT ");
        }
        sql.push_str(&format!(
            "EXISTS (SELECT {alias}.{doc} FROM {table} {alias} WHERE {alias}.{doc} = {column} AND {alias}.{path} = {tag}",
            doc = self.doc_column,
            table = self.table,
            path = self.path_column,
            tag = sql_literal(&relation.tag),
        ));
        if let Some(value) = &relation.value {
            sql.push_str(&format!(
                " AND {alias}.{col} = {value}",
                col = self.value_column,
                value = sql_literal(value)
            ));
        }
        sql.push(')');
    }

    /// Builds the picklist query for a link type.
    ///
    /// `predicates` are already-rendered rule predicates on `d.id`; each is
    /// ANDed onto the base query. The query takes two bound parameters, the
    /// title pattern and the link type, in that order.
    pub fn picklist_query(
        &self,
        link_type: LinkTypeId,
        predicates: &[String],
        title_pattern: &str,
        max_rows: Option<usize>,
    ) -> PicklistQuery {
        let mut sql = String::from("SELECT DISTINCT ");
        if let Some(rows) = max_rows {
            sql.push_str(&format!("TOP {rows} "));
        }
        sql.push_str(
            "d.id, d.title FROM document d \
             JOIN link_target lt ON d.doc_type = lt.target_doc_type \
             WHERE d.title LIKE ? AND lt.source_link_type = ?",
        );
        for predicate in predicates {
            sql.push_str(" AND ");
            sql.push_str(predicate);
        }
        sql.push_str(" ORDER BY d.title");

        PicklistQuery {
            sql,
            title_pattern: title_pattern.to_string(),
            link_type,
        }
    }
}

/// A picklist query and its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicklistQuery {
    /// Query text with two `?` placeholders.
    pub sql: String,
    /// First parameter: title `LIKE` pattern.
    pub title_pattern: String,
    /// Second parameter: source link type.
    pub link_type: LinkTypeId,
}

/// Quotes a string as a SQL literal, doubling embedded quotes.
pub fn sql_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
