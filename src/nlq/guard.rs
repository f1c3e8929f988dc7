use serde::Deserialize;
use sqlparser::ast::{ObjectName, Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;
use std::ops::ControlFlow;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    pub enforce_read_only: bool,
    /// Relations generated SQL may read. Empty disables the table check.
    pub allowed_tables: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enforce_read_only: true,
            allowed_tables: [
                "areas",
                "pacientes",
                "directorio_telefonico",
                "vista_ubicaciones_maestra",
                "edificios",
                "pisos",
                "unidades_hospitalarias",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GuardViolation {
    #[error("statement could not be parsed: {0}")]
    Unparseable(String),
    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),
    #[error("only read-only queries are allowed")]
    NotReadOnly,
    #[error("relation '{0}' is not in the allow-list")]
    RelationNotAllowed(String),
}

/// Restricts generated SQL to a single read-only query over known relations.
#[derive(Debug, Clone)]
pub struct SqlGuard {
    enforce_read_only: bool,
    allowed: HashSet<String>,
}

impl SqlGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            enforce_read_only: config.enforce_read_only,
            allowed: config.allowed_tables.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn check(&self, sql: &str) -> Result<(), GuardViolation> {
        if !self.enforce_read_only && self.allowed.is_empty() {
            return Ok(());
        }

        let statements = Parser::parse_sql(&DuckDbDialect {}, sql)
            .map_err(|e| GuardViolation::Unparseable(e.to_string()))?;
        if statements.len() != 1 {
            return Err(GuardViolation::StatementCount(statements.len()));
        }
        let statement = &statements[0];

        if self.enforce_read_only && !is_read_only(statement) {
            return Err(GuardViolation::NotReadOnly);
        }

        if !self.allowed.is_empty() {
            let mut collector = RelationCollector::default();
            let _ = statement.visit(&mut collector);
            for relation in collector.relations {
                if !self.allowed.contains(&relation) && !collector.ctes.contains(&relation) {
                    return Err(GuardViolation::RelationNotAllowed(relation));
                }
            }
        }

        Ok(())
    }
}

fn is_read_only(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => !writes_into(query),
        _ => false,
    }
}

// SELECT ... INTO creates a table.
fn writes_into(query: &Query) -> bool {
    match query.body.as_ref() {
        SetExpr::Select(select) => select.into.is_some(),
        _ => false,
    }
}

#[derive(Default)]
struct RelationCollector {
    ctes: HashSet<String>,
    relations: Vec<String>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.ctes.insert(cte.alias.name.value.to_lowercase());
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if let Some(ident) = relation.0.last() {
            self.relations.push(ident.value.to_lowercase());
        }
        ControlFlow::Continue(())
    }
}
