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

//! Execution plan construction for analytical statements.
//!
//! The planner reads clause boundaries from the top level of the statement
//! (outside parentheses and string literals) and assembles the plan
//! bottom-up: scans and joins, then filter, aggregation, `HAVING`, sort,
//! limit and finally projection. Compound statements (`UNION`,
//! `INTERSECT`, `EXCEPT`) plan each branch separately; a trailing
//! `ORDER BY`/`LIMIT` applies to the combined result.
//!
//! `INSERT ... SELECT` and `INSERT ... VALUES` put an insert node over the
//! plan of their source. Common table expressions are planned once and
//! inlined as derived tables wherever the statement scans them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlannerError {
    #[error("statement is not a SELECT")]
    NotASelect,
    #[error("missing FROM clause")]
    MissingFrom,
    #[error("empty select list")]
    EmptySelectList,
    #[error("empty {0} clause")]
    EmptyClause(&'static str),
    #[error("invalid {clause} value `{value}`")]
    InvalidNumber { clause: &'static str, value: String },
    #[error("JOIN without a table")]
    MissingJoinTable,
    #[error("unterminated derived table")]
    UnterminatedSubquery,
    #[error("malformed WITH clause")]
    MalformedWith,
    #[error("INSERT without a target table")]
    MissingInsertTarget,
    #[error("INSERT without a SELECT or VALUES source")]
    MissingInsertSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub expression: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOperation {
    Scan { table: String },
    Derived { alias: String },
    Join { join_type: JoinType, condition: Option<String> },
    Filter { predicate: String },
    Aggregate { group_by: Vec<String>, aggregates: Vec<String> },
    Having { predicate: String },
    Sort { keys: Vec<SortKey> },
    Limit { count: Option<u64>, offset: Option<u64> },
    Project { columns: Vec<String>, distinct: bool },
    SetOperation { operator: SetOperator },
    Insert { table: String, columns: Vec<String> },
    Values { rows: Vec<String> },
}

/// A node of the execution plan tree. Children are inputs of the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    pub operation: PlanOperation,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn leaf(operation: PlanOperation) -> Self {
        Self { operation, children: Vec::new() }
    }

    pub fn unary(operation: PlanOperation, child: PlanNode) -> Self {
        Self {
            operation,
            children: vec![child],
        }
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PlanNode::node_count).sum::<usize>()
    }
}

impl fmt::Display for PlanOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOperation::Scan { table } => write!(f, "Scan: {table}"),
            PlanOperation::Derived { alias } if alias.is_empty() => write!(f, "Subquery"),
            PlanOperation::Derived { alias } => write!(f, "Subquery: {alias}"),
            PlanOperation::Join { join_type, condition } => match condition {
                Some(condition) => write!(f, "{join_type:?} Join: {condition}"),
                None => write!(f, "{join_type:?} Join"),
            },
            PlanOperation::Filter { predicate } => write!(f, "Filter: {predicate}"),
            PlanOperation::Aggregate { group_by, aggregates } => {
                write!(f, "Aggregate: [{}]", aggregates.join(", "))?;
                if !group_by.is_empty() {
                    write!(f, " group by [{}]", group_by.join(", "))?;
                }
                Ok(())
            }
            PlanOperation::Having { predicate } => write!(f, "Having: {predicate}"),
            PlanOperation::Sort { keys } => {
                let rendered: Vec<String> = keys
                    .iter()
                    .map(|key| format!("{} {}", key.expression, if key.ascending { "ASC" } else { "DESC" }))
                    .collect();
                write!(f, "Sort: {}", rendered.join(", "))
            }
            PlanOperation::Limit { count, offset } => {
                write!(f, "Limit:")?;
                if let Some(count) = count {
                    write!(f, " {count}")?;
                }
                if let Some(offset) = offset {
                    write!(f, " offset {offset}")?;
                }
                Ok(())
            }
            PlanOperation::Project { columns, distinct } => {
                write!(f, "Project{}: {}", if *distinct { " (distinct)" } else { "" }, columns.join(", "))
            }
            PlanOperation::SetOperation { operator } => write!(f, "{operator:?}"),
            PlanOperation::Insert { table, columns } if columns.is_empty() => write!(f, "Insert: {table}"),
            PlanOperation::Insert { table, columns } => write!(f, "Insert: {table} ({})", columns.join(", ")),
            PlanOperation::Values { rows } => write!(f, "Values: {} row(s)", rows.len()),
        }
    }
}

static AGGREGATE_CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX)\s*\(").expect("static regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Builds the plan tree for a (normally already optimized) `SELECT`,
    /// `INSERT` or `WITH` statement.
    pub fn plan(&self, query: &str) -> Result<PlanNode, PlannerError> {
        let query = query.trim().trim_end_matches(';').trim_end();
        let words = top_level_words(query);
        match words.first().map(|word| word.upper.as_str()) {
            Some("WITH") => return self.plan_with(query, &words),
            Some("INSERT") => return self.plan_insert(query, &words),
            _ => {}
        }

        let mut branches: Vec<(usize, usize)> = Vec::new();
        let mut operators: Vec<SetOperator> = Vec::new();
        let mut branch_start = 0;
        let mut i = 0;
        while i < words.len() {
            let operator = match words[i].upper.as_str() {
                "UNION" if words.get(i + 1).is_some_and(|next| next.upper == "ALL") => Some((SetOperator::UnionAll, words[i + 1].end)),
                "UNION" => Some((SetOperator::Union, words[i].end)),
                "INTERSECT" => Some((SetOperator::Intersect, words[i].end)),
                "EXCEPT" => Some((SetOperator::Except, words[i].end)),
                _ => None,
            };
            if let Some((operator, end)) = operator {
                branches.push((branch_start, words[i].start));
                operators.push(operator);
                branch_start = end;
                if operator == SetOperator::UnionAll {
                    i += 1;
                }
            }
            i += 1;
        }

        if operators.is_empty() {
            return self.plan_select(query, true);
        }

        // ORDER BY / LIMIT / OFFSET after the last branch apply to the whole result.
        let last = &query[branch_start..];
        let tail_start = clause_markers(last)
            .iter()
            .filter(|marker| matches!(marker.clause, Clause::OrderBy | Clause::Limit | Clause::Offset))
            .map(|marker| marker.keyword_start)
            .min()
            .unwrap_or(last.len());
        branches.push((branch_start, branch_start + tail_start));

        let mut branch_plans = branches.iter().map(|&(start, end)| self.plan_select(&query[start..end], false));
        let mut combined = match branch_plans.next() {
            Some(plan) => plan?,
            None => return Err(PlannerError::NotASelect),
        };
        for (operator, plan) in operators.into_iter().zip(branch_plans) {
            combined = PlanNode {
                operation: PlanOperation::SetOperation { operator },
                children: vec![combined, plan?],
            };
        }

        let tail = &last[tail_start..];
        let markers = clause_markers(tail);
        self.apply_ordering(combined, tail, &markers)
    }

    /// Renders `node` and its inputs, one node per line, indented by depth.
    pub fn explain_plan(&self, node: &PlanNode, indent: usize) -> String {
        let mut output = String::new();
        output.push_str(&"  ".repeat(indent));
        output.push_str("-> ");
        output.push_str(&node.operation.to_string());
        output.push('\n');
        for child in &node.children {
            output.push_str(&self.explain_plan(child, indent + 1));
        }
        output
    }

    fn plan_with(&self, query: &str, words: &[Word]) -> Result<PlanNode, PlannerError> {
        let mut start = words[0].end;
        if words.get(1).is_some_and(|word| word.upper == "RECURSIVE") {
            start = words[1].end;
        }

        let mut ctes: Vec<(String, PlanNode)> = Vec::new();
        let mut rest = query[start..].trim_start();
        loop {
            let name_end = rest.bytes().position(|byte| !is_word_byte(byte)).unwrap_or(rest.len());
            if name_end == 0 {
                return Err(PlannerError::MalformedWith);
            }
            let name = &rest[..name_end];
            rest = rest[name_end..].trim_start();

            // Column list
            if rest.starts_with('(') {
                let close = matching_paren(rest).ok_or(PlannerError::MalformedWith)?;
                rest = rest[close + 1..].trim_start();
            }

            let as_word = top_level_words(rest).into_iter().next().filter(|word| word.start == 0 && word.upper == "AS");
            let Some(as_word) = as_word else {
                return Err(PlannerError::MalformedWith);
            };
            rest = rest[as_word.end..].trim_start();
            if !rest.starts_with('(') {
                return Err(PlannerError::MalformedWith);
            }
            let close = matching_paren(rest).ok_or(PlannerError::UnterminatedSubquery)?;
            let body = inline_ctes(self.plan(&rest[1..close])?, &ctes);
            ctes.push((name.to_string(), body));

            rest = rest[close + 1..].trim_start();
            match rest.strip_prefix(',') {
                Some(next) => rest = next.trim_start(),
                None => break,
            }
        }

        Ok(inline_ctes(self.plan(rest)?, &ctes))
    }

    fn plan_insert(&self, query: &str, words: &[Word]) -> Result<PlanNode, PlannerError> {
        let into = words.get(1).filter(|word| word.upper == "INTO").ok_or(PlannerError::MissingInsertTarget)?;
        let source = words[2..].iter().find(|word| matches!(word.upper.as_str(), "SELECT" | "WITH" | "VALUES"));
        let target_end = source.map(|word| word.start).unwrap_or(query.len());
        let target = query[into.end..target_end].trim();
        if target.is_empty() || target.starts_with('(') {
            return Err(PlannerError::MissingInsertTarget);
        }
        let source = source.ok_or(PlannerError::MissingInsertSource)?;

        let (table, columns) = match target.find('(') {
            Some(open) => {
                let list = &target[open..];
                let close = matching_paren(list).ok_or(PlannerError::UnterminatedSubquery)?;
                let columns = split_top_level(&list[1..close]).into_iter().map(str::to_string).collect();
                (target[..open].trim().to_string(), columns)
            }
            None => (target.to_string(), Vec::new()),
        };

        let input = if source.upper == "VALUES" {
            let rows: Vec<String> = split_top_level(&query[source.end..]).into_iter().map(str::to_string).collect();
            if rows.is_empty() {
                return Err(PlannerError::EmptyClause("VALUES"));
            }
            PlanNode::leaf(PlanOperation::Values { rows })
        } else {
            self.plan(&query[source.start..])?
        };

        Ok(PlanNode::unary(PlanOperation::Insert { table, columns }, input))
    }

    fn plan_select(&self, text: &str, with_ordering: bool) -> Result<PlanNode, PlannerError> {
        let text = text.trim();
        let words = top_level_words(text);
        if words.first().is_none_or(|word| word.upper != "SELECT") {
            return Err(PlannerError::NotASelect);
        }

        let markers = clause_markers(text);
        let from = markers.iter().find(|marker| marker.clause == Clause::From).ok_or(PlannerError::MissingFrom)?;

        let mut select_list = text[words[0].end..from.keyword_start].trim();
        let mut distinct = false;
        if let Some(word) = top_level_words(select_list).first()
            && word.upper == "DISTINCT"
        {
            distinct = true;
            select_list = select_list[word.end..].trim();
        }
        let columns: Vec<String> = split_top_level(select_list).into_iter().map(str::to_string).collect();
        if columns.is_empty() {
            return Err(PlannerError::EmptySelectList);
        }

        let from_text = clause_text(text, &markers, Clause::From).unwrap_or_default();
        if from_text.is_empty() {
            return Err(PlannerError::EmptyClause("FROM"));
        }
        let mut node = self.plan_from(from_text)?;

        if let Some(predicate) = clause_text(text, &markers, Clause::Where) {
            if predicate.is_empty() {
                return Err(PlannerError::EmptyClause("WHERE"));
            }
            node = PlanNode::unary(PlanOperation::Filter { predicate: predicate.to_string() }, node);
        }

        let group_by: Vec<String> = match clause_text(text, &markers, Clause::GroupBy) {
            Some(list) if list.is_empty() => return Err(PlannerError::EmptyClause("GROUP BY")),
            Some(list) => split_top_level(list).into_iter().map(str::to_string).collect(),
            None => Vec::new(),
        };
        let aggregates: Vec<String> = columns.iter().filter(|column| AGGREGATE_CALL.is_match(column)).cloned().collect();
        if !group_by.is_empty() || !aggregates.is_empty() {
            node = PlanNode::unary(PlanOperation::Aggregate { group_by, aggregates }, node);
        }

        if let Some(predicate) = clause_text(text, &markers, Clause::Having) {
            if predicate.is_empty() {
                return Err(PlannerError::EmptyClause("HAVING"));
            }
            node = PlanNode::unary(PlanOperation::Having { predicate: predicate.to_string() }, node);
        }

        if with_ordering {
            node = self.apply_ordering(node, text, &markers)?;
        }

        Ok(PlanNode::unary(PlanOperation::Project { columns, distinct }, node))
    }

    fn apply_ordering(&self, mut node: PlanNode, text: &str, markers: &[ClauseMarker]) -> Result<PlanNode, PlannerError> {
        if let Some(list) = clause_text(text, markers, Clause::OrderBy) {
            let keys: Vec<SortKey> = split_top_level(list).into_iter().map(parse_sort_key).collect();
            if keys.is_empty() {
                return Err(PlannerError::EmptyClause("ORDER BY"));
            }
            node = PlanNode::unary(PlanOperation::Sort { keys }, node);
        }

        let count = clause_text(text, markers, Clause::Limit).map(|value| parse_number("LIMIT", value)).transpose()?;
        let offset = clause_text(text, markers, Clause::Offset).map(|value| parse_number("OFFSET", value)).transpose()?;
        if count.is_some() || offset.is_some() {
            node = PlanNode::unary(PlanOperation::Limit { count, offset }, node);
        }

        Ok(node)
    }

    fn plan_from(&self, from: &str) -> Result<PlanNode, PlannerError> {
        let words = top_level_words(from);

        // (prefix start, end of JOIN keyword, join type)
        let mut joins: Vec<(usize, usize, JoinType)> = Vec::new();
        for (idx, word) in words.iter().enumerate() {
            if word.upper != "JOIN" {
                continue;
            }
            let mut prefix_start = word.start;
            let mut join_type = JoinType::Inner;
            for prev in words[..idx].iter().rev() {
                match prev.upper.as_str() {
                    "INNER" | "OUTER" | "NATURAL" => {}
                    "LEFT" => join_type = JoinType::Left,
                    "RIGHT" => join_type = JoinType::Right,
                    "FULL" => join_type = JoinType::Full,
                    "CROSS" => join_type = JoinType::Cross,
                    _ => break,
                }
                prefix_start = prev.start;
            }
            joins.push((prefix_start, word.end, join_type));
        }

        let base_end = joins.first().map(|join| join.0).unwrap_or(from.len());
        let mut tables = split_top_level(&from[..base_end]).into_iter();
        let mut node = match tables.next() {
            Some(table) => self.plan_table(table)?,
            None => return Err(PlannerError::EmptyClause("FROM")),
        };
        for table in tables {
            node = PlanNode {
                operation: PlanOperation::Join {
                    join_type: JoinType::Cross,
                    condition: None,
                },
                children: vec![node, self.plan_table(table)?],
            };
        }

        for (idx, &(_, join_end, join_type)) in joins.iter().enumerate() {
            let segment_end = joins.get(idx + 1).map(|next| next.0).unwrap_or(from.len());
            let segment = &from[join_end..segment_end];

            let condition_word = top_level_words(segment).into_iter().find(|word| word.upper == "ON" || word.upper == "USING");
            let (table, condition) = match condition_word {
                Some(word) if word.upper == "ON" => (segment[..word.start].trim(), Some(segment[word.end..].trim().to_string())),
                Some(word) => (segment[..word.start].trim(), Some(segment[word.start..].trim().to_string())),
                None => (segment.trim(), None),
            };
            if table.is_empty() {
                return Err(PlannerError::MissingJoinTable);
            }

            node = PlanNode {
                operation: PlanOperation::Join { join_type, condition },
                children: vec![node, self.plan_table(table)?],
            };
        }

        Ok(node)
    }

    fn plan_table(&self, table: &str) -> Result<PlanNode, PlannerError> {
        let table = table.trim();
        if !table.starts_with('(') {
            return Ok(PlanNode::leaf(PlanOperation::Scan { table: table.to_string() }));
        }

        let close = matching_paren(table).ok_or(PlannerError::UnterminatedSubquery)?;
        let inner = self.plan(&table[1..close])?;
        let alias = strip_as(&table[close + 1..]);
        Ok(PlanNode::unary(PlanOperation::Derived { alias: alias.to_string() }, inner))
    }
}

/// Drops a leading `AS` keyword, in any letter case, from an alias.
fn strip_as(alias: &str) -> &str {
    let alias = alias.trim();
    match top_level_words(alias).first() {
        Some(word) if word.start == 0 && word.upper == "AS" => alias[word.end..].trim(),
        _ => alias,
    }
}

/// Replaces scans of a named common table expression with its plan.
fn inline_ctes(node: PlanNode, ctes: &[(String, PlanNode)]) -> PlanNode {
    if let PlanOperation::Scan { table } = &node.operation {
        let name = table.split_whitespace().next().unwrap_or_default();
        if let Some((cte, plan)) = ctes.iter().find(|(cte, _)| cte.eq_ignore_ascii_case(name)) {
            let alias = strip_as(&table[name.len()..]);
            let alias = if alias.is_empty() { cte.clone() } else { alias.to_string() };
            return PlanNode::unary(PlanOperation::Derived { alias }, plan.clone());
        }
        return node;
    }
    PlanNode {
        operation: node.operation,
        children: node.children.into_iter().map(|child| inline_ctes(child, ctes)).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
}

#[derive(Debug, Clone, Copy)]
struct ClauseMarker {
    clause: Clause,
    keyword_start: usize,
    content_start: usize,
}

fn clause_markers(text: &str) -> Vec<ClauseMarker> {
    let words = top_level_words(text);
    let mut markers = Vec::new();

    for (idx, word) in words.iter().enumerate() {
        let followed_by_by = words.get(idx + 1).filter(|next| next.upper == "BY");
        let (clause, content_start) = match (word.upper.as_str(), followed_by_by) {
            ("FROM", _) => (Clause::From, word.end),
            ("WHERE", _) => (Clause::Where, word.end),
            ("GROUP", Some(by)) => (Clause::GroupBy, by.end),
            ("HAVING", _) => (Clause::Having, word.end),
            ("ORDER", Some(by)) => (Clause::OrderBy, by.end),
            ("LIMIT", _) => (Clause::Limit, word.end),
            ("OFFSET", _) => (Clause::Offset, word.end),
            _ => continue,
        };
        // Only the first occurrence of a clause keyword counts.
        if markers.iter().any(|marker: &ClauseMarker| marker.clause == clause) {
            continue;
        }
        markers.push(ClauseMarker {
            clause,
            keyword_start: word.start,
            content_start,
        });
    }

    markers
}

fn clause_text<'a>(text: &'a str, markers: &[ClauseMarker], clause: Clause) -> Option<&'a str> {
    let marker = markers.iter().find(|marker| marker.clause == clause)?;
    let end = markers
        .iter()
        .map(|other| other.keyword_start)
        .filter(|&start| start > marker.keyword_start)
        .min()
        .unwrap_or(text.len());
    Some(text[marker.content_start..end].trim())
}

fn parse_sort_key(item: &str) -> SortKey {
    let words = top_level_words(item);
    match words.last() {
        Some(word) if word.upper == "DESC" => SortKey {
            expression: item[..word.start].trim().to_string(),
            ascending: false,
        },
        Some(word) if word.upper == "ASC" => SortKey {
            expression: item[..word.start].trim().to_string(),
            ascending: true,
        },
        _ => SortKey {
            expression: item.trim().to_string(),
            ascending: true,
        },
    }
}

fn parse_number(clause: &'static str, value: &str) -> Result<u64, PlannerError> {
    value.trim().parse::<u64>().map_err(|_| PlannerError::InvalidNumber {
        clause,
        value: value.trim().to_string(),
    })
}

#[derive(Debug, Clone)]
struct Word {
    start: usize,
    end: usize,
    upper: String,
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

/// Words at parenthesis depth zero, outside single-quoted literals.
fn top_level_words(text: &str) -> Vec<Word> {
    let bytes = text.as_bytes();
    let mut words = Vec::new();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = skip_literal(bytes, i),
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
            }
            byte if is_word_byte(byte) => {
                let start = i;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                if depth == 0 {
                    words.push(Word {
                        start,
                        end: i,
                        upper: text[start..i].to_ascii_uppercase(),
                    });
                }
            }
            _ => i += 1,
        }
    }

    words
}

/// Returns the index just past the literal opening at `start`.
fn skip_literal(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Splits on commas at parenthesis depth zero, dropping empty items.
fn split_top_level(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_literal(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => depth -= 1,
            b',' if depth == 0 => {
                items.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    items.push(text[start..].trim());

    items.into_iter().filter(|item| !item.is_empty()).collect()
}

/// Index of the parenthesis closing the one at position 0.
fn matching_paren(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_literal(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
