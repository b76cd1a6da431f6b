use std::collections::HashSet;

use crate::error::PathError;

use super::{Document, ElementId};

/// Compiled ElementTree-style path (`.//Server`, `Connection/*[@primary='yes']`, ...).
///
/// Paths are always relative to the element they are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    ops: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    /// Children (or all descendants) matching a name test.
    Select { axis: Axis, name: NameTest },
    Parent,
    Filter(Predicate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Named(n) => n == name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttribute(String),
    AttributeEquals(String, String),
    HasChild(String),
    ChildTextEquals(String, String),
    TextEquals(String),
    /// 1-based position among same-named siblings.
    Position(usize),
    /// `last()` minus the offset.
    FromLast(usize),
}

impl ElementPath {
    pub fn compile(expr: &str) -> Result<Self, PathError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(PathError::Empty);
        }
        if expr.starts_with('/') {
            return Err(PathError::Absolute);
        }

        let mut ops = Vec::new();
        let mut rest = expr;
        let mut axis = Axis::Child;

        loop {
            let (step, predicates, remainder) = split_step(rest)?;
            match step {
                "." if axis == Axis::Child => {}
                ".." if axis == Axis::Child => ops.push(Op::Parent),
                "*" => ops.push(Op::Select {
                    axis,
                    name: NameTest::Any,
                }),
                name if is_valid_name(name) => ops.push(Op::Select {
                    axis,
                    name: NameTest::Named(name.to_string()),
                }),
                other => return Err(PathError::InvalidStep(other.to_string())),
            }
            for raw in predicates {
                ops.push(Op::Filter(parse_predicate(raw)?));
            }

            if remainder.is_empty() {
                break;
            }
            if let Some(r) = remainder.strip_prefix("//") {
                axis = Axis::Descendant;
                rest = r;
            } else if let Some(r) = remainder.strip_prefix('/') {
                axis = Axis::Child;
                rest = r;
            } else {
                return Err(PathError::InvalidStep(remainder.to_string()));
            }
            if rest.is_empty() {
                return Err(PathError::InvalidStep(expr.to_string()));
            }
        }

        Ok(Self { ops })
    }

    /// First match in evaluation order, if any.
    pub fn find(&self, doc: &Document, context: ElementId) -> Option<ElementId> {
        self.find_all(doc, context).into_iter().next()
    }

    /// Every element the path selects from `context`, duplicates removed.
    pub fn find_all(&self, doc: &Document, context: ElementId) -> Vec<ElementId> {
        let mut current = vec![context];
        for op in &self.ops {
            current = match op {
                Op::Select { axis, name } => {
                    let mut out = Vec::new();
                    for &id in &current {
                        match axis {
                            Axis::Child => out.extend(
                                doc.get(id)
                                    .children
                                    .iter()
                                    .copied()
                                    .filter(|&c| name.matches(&doc.get(c).name)),
                            ),
                            Axis::Descendant => collect_descendants(doc, id, name, &mut out),
                        }
                    }
                    dedup(out)
                }
                Op::Parent => dedup(current.iter().filter_map(|&id| doc.get(id).parent).collect()),
                Op::Filter(pred) => current
                    .into_iter()
                    .filter(|&id| pred.matches(doc, id))
                    .collect(),
            };
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

fn collect_descendants(doc: &Document, id: ElementId, name: &NameTest, out: &mut Vec<ElementId>) {
    for &child in &doc.get(id).children {
        if name.matches(&doc.get(child).name) {
            out.push(child);
        }
        collect_descendants(doc, child, name, out);
    }
}

fn dedup(ids: Vec<ElementId>) -> Vec<ElementId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl Predicate {
    fn matches(&self, doc: &Document, id: ElementId) -> bool {
        let element = doc.get(id);
        match self {
            Predicate::HasAttribute(key) => element.attribute(key).is_some(),
            Predicate::AttributeEquals(key, value) => element.attribute(key) == Some(value.as_str()),
            Predicate::HasChild(tag) => element.children.iter().any(|&c| doc.get(c).name == *tag),
            Predicate::ChildTextEquals(tag, value) => element
                .children
                .iter()
                .any(|&c| doc.get(c).name == *tag && doc.itertext(c) == *value),
            Predicate::TextEquals(value) => doc.itertext(id) == *value,
            Predicate::Position(n) => sibling_position(doc, id).is_some_and(|(pos, _)| pos == *n),
            Predicate::FromLast(offset) => sibling_position(doc, id)
                .is_some_and(|(pos, count)| count.checked_sub(*offset) == Some(pos)),
        }
    }
}

/// (1-based position, count) among siblings sharing the element's name.
fn sibling_position(doc: &Document, id: ElementId) -> Option<(usize, usize)> {
    let element = doc.get(id);
    let parent = element.parent?;
    let same: Vec<ElementId> = doc
        .get(parent)
        .children
        .iter()
        .copied()
        .filter(|&c| doc.get(c).name == element.name)
        .collect();
    let pos = same.iter().position(|&c| c == id)?;
    Some((pos + 1, same.len()))
}

/// Split `input` into its leading step name, the raw predicate bodies that follow
/// it, and the unparsed remainder (which starts with `/` or is empty).
fn split_step(input: &str) -> Result<(&str, Vec<&str>, &str), PathError> {
    let name_end = input.find(['/', '[']).unwrap_or(input.len());
    let step = &input[..name_end];
    let mut rest = &input[name_end..];
    let mut predicates = Vec::new();

    while rest.starts_with('[') {
        let close = find_predicate_end(rest)
            .ok_or_else(|| PathError::InvalidPredicate(rest[1..].to_string()))?;
        predicates.push(&rest[1..close]);
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() && !rest.starts_with('/') {
        return Err(PathError::InvalidStep(input.to_string()));
    }
    Ok((step, predicates, rest))
}

/// Byte index of the `]` closing the predicate at the start of `input`, skipping quoted text.
fn find_predicate_end(input: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices().skip(1) {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ']' => return Some(i),
            None => {}
        }
    }
    None
}

fn parse_predicate(raw: &str) -> Result<Predicate, PathError> {
    let body = raw.trim();
    let invalid = || PathError::InvalidPredicate(raw.to_string());

    if let Ok(n) = body.parse::<usize>() {
        return if n == 0 {
            Err(invalid())
        } else {
            Ok(Predicate::Position(n))
        };
    }
    if body == "last()" {
        return Ok(Predicate::FromLast(0));
    }
    if let Some(offset) = body.strip_prefix("last()-") {
        return offset
            .trim()
            .parse::<usize>()
            .map(Predicate::FromLast)
            .map_err(|_| invalid());
    }

    let (lhs, value) = match body.split_once('=') {
        Some((lhs, rhs)) => (lhs.trim(), Some(unquote(rhs.trim()).ok_or_else(invalid)?)),
        None => (body, None),
    };

    if let Some(attr) = lhs.strip_prefix('@') {
        if !is_valid_name(attr) {
            return Err(invalid());
        }
        return Ok(match value {
            Some(v) => Predicate::AttributeEquals(attr.to_string(), v.to_string()),
            None => Predicate::HasAttribute(attr.to_string()),
        });
    }
    if lhs == "." {
        return value
            .map(|v| Predicate::TextEquals(v.to_string()))
            .ok_or_else(invalid);
    }
    if is_valid_name(lhs) {
        return Ok(match value {
            Some(v) => Predicate::ChildTextEquals(lhs.to_string(), v.to_string()),
            None => Predicate::HasChild(lhs.to_string()),
        });
    }
    Err(invalid())
}

fn unquote(s: &str) -> Option<&str> {
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    s.strip_prefix(quote)?.strip_suffix(quote)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}
