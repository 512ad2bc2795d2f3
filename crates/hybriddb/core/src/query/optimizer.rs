// HybridDB
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Text-level rewrites for analytical statements.
//!
//! The optimizer validates the statement, then applies its rewrite rules in
//! order until a full pass changes nothing. Rules are pure functions of the
//! text, so optimizing the same statement always yields the same output and
//! optimizing an already optimized statement is a no-op.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptimizerError {
    #[error("query text is empty")]
    EmptyQuery,
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("unterminated string literal")]
    UnterminatedLiteral,
    #[error("rewrite did not converge after {0} passes")]
    MaxIterationsExceeded(usize),
}

/// A single deterministic rewrite of query text.
pub trait RewriteRule: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Returns the rewritten text, or `None` when the rule does not apply.
    fn apply(&self, query: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleApplication {
    pub rule_name: String,
    pub description: String,
}

pub struct QueryOptimizer {
    rules: Vec<Box<dyn RewriteRule>>,
    max_iterations: usize,
}

impl QueryOptimizer {
    pub fn new() -> Self {
        let mut optimizer = Self::empty();
        optimizer.add_rule(Box::new(WhitespaceRule));
        optimizer.add_rule(Box::new(TautologyRule));
        optimizer.add_rule(Box::new(CountStarRule));
        optimizer.add_rule(Box::new(KeywordCaseRule));
        optimizer
    }

    /// An optimizer without rules; `optimize` only validates.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            max_iterations: 10,
        }
    }

    pub fn add_rule(&mut self, rule: Box<dyn RewriteRule>) {
        self.rules.push(rule);
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations.max(1);
    }

    pub fn optimize(&self, query: &str) -> Result<String, OptimizerError> {
        self.optimize_with_trace(query).map(|(optimized, _)| optimized)
    }

    /// Optimizes `query` and reports every rule that changed the text.
    pub fn optimize_with_trace(&self, query: &str) -> Result<(String, Vec<RuleApplication>), OptimizerError> {
        validate(query)?;

        let mut current = query.to_string();
        let mut applications: Vec<RuleApplication> = Vec::new();

        for _ in 0..self.max_iterations {
            let mut changed = false;

            for rule in &self.rules {
                if let Some(rewritten) = rule.apply(&current)
                    && rewritten != current
                {
                    current = rewritten;
                    changed = true;
                    if !applications.iter().any(|app| app.rule_name == rule.name()) {
                        applications.push(RuleApplication {
                            rule_name: rule.name().to_string(),
                            description: rule.description().to_string(),
                        });
                    }
                }
            }

            if !changed {
                return Ok((current, applications));
            }
        }

        Err(OptimizerError::MaxIterationsExceeded(self.max_iterations))
    }

    /// Human-readable account of what turned `original` into `optimized`.
    pub fn get_optimization_explanation(&self, original: &str, optimized: &str) -> String {
        let mut explanation = String::new();
        explanation.push_str(&format!("Original query:  {}\n", original.trim()));
        explanation.push_str(&format!("Optimized query: {optimized}\n"));

        if original == optimized {
            explanation.push_str("No optimizations applied.\n");
            return explanation;
        }

        match self.optimize_with_trace(original) {
            Ok((replayed, applications)) if replayed == optimized && !applications.is_empty() => {
                explanation.push_str("Applied optimizations:\n");
                for (i, app) in applications.iter().enumerate() {
                    explanation.push_str(&format!("{}. {} - {}\n", i + 1, app.rule_name, app.description));
                }
            }
            _ => explanation.push_str("Query text was rewritten outside the configured rules.\n"),
        }

        explanation
    }
}

impl Default for QueryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(query: &str) -> Result<(), OptimizerError> {
    if query.trim().is_empty() {
        return Err(OptimizerError::EmptyQuery);
    }

    let mut depth: i64 = 0;
    for segment in split_literals(query) {
        match segment {
            Segment::Code(code) => {
                for ch in code.chars() {
                    match ch {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth < 0 {
                                return Err(OptimizerError::UnbalancedParentheses);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Segment::Literal(_) => {}
            Segment::Unterminated(_) => return Err(OptimizerError::UnterminatedLiteral),
        }
    }

    if depth != 0 { Err(OptimizerError::UnbalancedParentheses) } else { Ok(()) }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Code(&'a str),
    Literal(&'a str),
    Unterminated(&'a str),
}

/// Splits text into code and single-quoted literal segments. A doubled
/// quote inside a literal is an escaped quote.
fn split_literals(query: &str) -> Vec<Segment<'_>> {
    let bytes = query.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\'' {
            i += 1;
            continue;
        }

        if start < i {
            segments.push(Segment::Code(&query[start..i]));
        }

        let literal_start = i;
        i += 1;
        let mut closed = false;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                    i += 2;
                    continue;
                }
                closed = true;
                i += 1;
                break;
            }
            i += 1;
        }

        if !closed {
            segments.push(Segment::Unterminated(&query[literal_start..]));
            return segments;
        }
        segments.push(Segment::Literal(&query[literal_start..i]));
        start = i;
    }

    if start < bytes.len() {
        segments.push(Segment::Code(&query[start..]));
    }
    segments
}

/// Applies `rewrite` to code segments only, leaving literals untouched.
pub(crate) fn rewrite_code(query: &str, rewrite: impl Fn(&str) -> String) -> String {
    split_literals(query)
        .into_iter()
        .map(|segment| match segment {
            Segment::Code(code) => rewrite(code),
            Segment::Literal(text) | Segment::Unterminated(text) => text.to_string(),
        })
        .collect()
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static TAUTOLOGY_WHERE_AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bWHERE\s+1\s*=\s*1\s+AND\s+").expect("static regex"));
static TAUTOLOGY_WHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\bWHERE\s+1\s*=\s*1\s*(\b(?:GROUP|ORDER|HAVING|LIMIT|OFFSET|UNION|INTERSECT|EXCEPT)\b|\)|;|$)").expect("static regex")
});
static COUNT_ONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bCOUNT\s*\(\s*1\s*\)").expect("static regex"));
static KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(select|from|where|and|or|not|group|order|by|having|limit|offset|join|inner|left|right|full|outer|cross|on|as|distinct|union|all|intersect|except|asc|desc|count|sum|avg|min|max|in|is|null|like|between)\b",
    )
    .expect("static regex")
});

/// Collapses whitespace runs outside string literals and trims the ends.
pub(crate) fn collapse_whitespace(query: &str) -> String {
    rewrite_code(query, |code| WHITESPACE.replace_all(code, " ").into_owned()).trim().to_string()
}

/// Collapses whitespace runs and strips trailing semicolons.
pub struct WhitespaceRule;

impl RewriteRule for WhitespaceRule {
    fn name(&self) -> &str {
        "WhitespaceNormalization"
    }

    fn description(&self) -> &str {
        "collapsed whitespace and removed trailing semicolons"
    }

    fn apply(&self, query: &str) -> Option<String> {
        let trimmed = collapse_whitespace(query).trim_end_matches(';').trim_end().to_string();
        (trimmed != query).then_some(trimmed)
    }
}

/// Removes `WHERE 1=1` predicates that are conjoined with the rest of the
/// condition or stand alone before a clause boundary.
pub struct TautologyRule;

impl RewriteRule for TautologyRule {
    fn name(&self) -> &str {
        "TautologyElimination"
    }

    fn description(&self) -> &str {
        "removed always-true WHERE 1=1 predicate"
    }

    fn apply(&self, query: &str) -> Option<String> {
        let rewritten = rewrite_code(query, |code| {
            let without_and = TAUTOLOGY_WHERE_AND.replace_all(code, "WHERE ");
            TAUTOLOGY_WHERE
                .replace_all(&without_and, |caps: &Captures| match &caps[1] {
                    "" => String::new(),
                    ")" | ";" => caps[1].to_string(),
                    keyword => format!(" {keyword}"),
                })
                .into_owned()
        });
        (rewritten != query).then_some(rewritten)
    }
}

/// Rewrites `COUNT(1)` to `COUNT(*)`.
pub struct CountStarRule;

impl RewriteRule for CountStarRule {
    fn name(&self) -> &str {
        "CountStarNormalization"
    }

    fn description(&self) -> &str {
        "rewrote COUNT(1) as COUNT(*)"
    }

    fn apply(&self, query: &str) -> Option<String> {
        let rewritten = rewrite_code(query, |code| COUNT_ONE.replace_all(code, "COUNT(*)").into_owned());
        (rewritten != query).then_some(rewritten)
    }
}

/// Upper-cases SQL keywords outside string literals.
pub struct KeywordCaseRule;

impl RewriteRule for KeywordCaseRule {
    fn name(&self) -> &str {
        "KeywordCanonicalization"
    }

    fn description(&self) -> &str {
        "upper-cased SQL keywords"
    }

    fn apply(&self, query: &str) -> Option<String> {
        let rewritten = rewrite_code(query, |code| KEYWORDS.replace_all(code, |caps: &regex::Captures| caps[0].to_uppercase()).into_owned());
        (rewritten != query).then_some(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_whitespace_and_semicolon_are_normalized() {
        let optimizer = QueryOptimizer::new();
        let optimized = optimizer.optimize("  SELECT  a,\n  b FROM   t ;  ").unwrap();
        assert_eq!(optimized, "SELECT a, b FROM t");
    }

    #[test]
    fn test_tautology_is_removed() {
        let optimizer = QueryOptimizer::new();
        assert_eq!(optimizer.optimize("SELECT a FROM t WHERE 1=1 AND b > 2").unwrap(), "SELECT a FROM t WHERE b > 2");
        assert_eq!(
            optimizer.optimize("SELECT a FROM t WHERE 1 = 1 GROUP BY a").unwrap(),
            "SELECT a FROM t GROUP BY a"
        );
    }

    #[test]
    fn test_tautology_at_boundaries() {
        let optimizer = QueryOptimizer::new();
        assert_eq!(optimizer.optimize("SELECT a FROM t WHERE 1=1").unwrap(), "SELECT a FROM t");
        assert_eq!(optimizer.optimize("SELECT a FROM t WHERE 1=1;").unwrap(), "SELECT a FROM t");
        assert_eq!(
            optimizer.optimize("SELECT a FROM (SELECT a FROM t WHERE 1=1) s ORDER BY a").unwrap(),
            "SELECT a FROM (SELECT a FROM t) s ORDER BY a"
        );
        assert_eq!(
            optimizer.optimize("SELECT a FROM t WHERE 1 = 1 limit 5").unwrap(),
            "SELECT a FROM t LIMIT 5"
        );
    }

    #[test]
    fn test_disjunctive_tautology_is_kept() {
        let optimizer = QueryOptimizer::new();
        let query = "SELECT SUM(x) FROM t WHERE 1=1 OR y = 2";
        assert_eq!(optimizer.optimize(query).unwrap(), query);
        assert_eq!(
            optimizer.optimize("select a from t where 1 = 1 or b > 2 group by a").unwrap(),
            "SELECT a FROM t WHERE 1 = 1 OR b > 2 GROUP BY a"
        );
    }

    #[test]
    fn test_collapse_whitespace_keeps_literal_spacing() {
        assert_eq!(collapse_whitespace("  SELECT\t*  FROM t WHERE n = 'a  b'  "), "SELECT * FROM t WHERE n = 'a  b'");
        assert_ne!(collapse_whitespace("SELECT 'a  b'"), collapse_whitespace("SELECT 'a b'"));
    }

    #[test]
    fn test_count_one_and_keywords() {
        let optimizer = QueryOptimizer::new();
        let optimized = optimizer.optimize("select dept, count(1) from emp group by dept").unwrap();
        assert_eq!(optimized, "SELECT dept, COUNT(*) FROM emp GROUP BY dept");
    }

    #[test]
    fn test_literals_are_untouched() {
        let optimizer = QueryOptimizer::new();
        let optimized = optimizer.optimize("select name from t where note = 'group  by  count(1)'").unwrap();
        assert_eq!(optimized, "SELECT name FROM t WHERE note = 'group  by  count(1)'");
    }

    #[test]
    fn test_malformed_text_is_rejected() {
        let optimizer = QueryOptimizer::new();
        assert_eq!(optimizer.optimize("   "), Err(OptimizerError::EmptyQuery));
        assert_eq!(optimizer.optimize("SELECT COUNT(* FROM t"), Err(OptimizerError::UnbalancedParentheses));
        assert_eq!(optimizer.optimize("SELECT a) FROM t"), Err(OptimizerError::UnbalancedParentheses));
        assert_eq!(optimizer.optimize("SELECT 'abc FROM t"), Err(OptimizerError::UnterminatedLiteral));
    }

    #[test]
    fn test_escaped_quote_inside_literal() {
        let optimizer = QueryOptimizer::new();
        let optimized = optimizer.optimize("select a from t where b = 'it''s (here'").unwrap();
        assert_eq!(optimized, "SELECT a FROM t WHERE b = 'it''s (here'");
    }

    #[test]
    fn test_explanation_lists_applied_rules() {
        let optimizer = QueryOptimizer::new();
        let original = "select count(1) from t";
        let optimized = optimizer.optimize(original).unwrap();
        let explanation = optimizer.get_optimization_explanation(original, &optimized);

        assert!(explanation.contains("CountStarNormalization"));
        assert!(explanation.contains("KeywordCanonicalization"));
        assert_eq!(explanation, optimizer.get_optimization_explanation(original, &optimized));
    }

    #[test]
    fn test_explanation_for_unchanged_query() {
        let optimizer = QueryOptimizer::new();
        let explanation = optimizer.get_optimization_explanation("SELECT a FROM t", "SELECT a FROM t");
        assert!(explanation.contains("No optimizations applied"));
    }

    #[test]
    fn test_empty_optimizer_only_validates() {
        let optimizer = QueryOptimizer::empty();
        assert_eq!(optimizer.optimize("select  a from t").unwrap(), "select  a from t");
    }

    proptest! {
        #[test]
        fn prop_optimize_is_idempotent(query in "[a-zA-Z0-9 ,*=<>]{1,60}") {
            let optimizer = QueryOptimizer::new();
            if let Ok(once) = optimizer.optimize(&query) {
                if !once.is_empty() {
                    prop_assert_eq!(optimizer.optimize(&once).unwrap(), once.clone());
                }
                prop_assert_eq!(optimizer.optimize(&query).unwrap(), once);
            }
        }
    }
}
