//! Line-oriented API Blueprint outline parser
//!
//! Recognizes the section skeleton of a blueprint:
//!
//! ```text
//! FORMAT: 1A                  metadata (before the first heading)
//! # Inbox API                 API name
//! # Group Messages            resource group
//! ## Message [/messages/{id}] resource
//! ### Retrieve [GET]          action
//! ```
//!
//! Any other line is description text for the innermost open section.
//! The first error stops the parse; everything built up to that point is
//! kept so callers receive a partial tree.

use super::ast::{Action, Blueprint, Metadata, Resource, ResourceGroup};
use super::sourcemap::{ActionMap, Ranges, ResourceGroupMap, ResourceMap, SourceMap};
use super::Parser;
use crate::job::{Job, OptionFlags};
use crate::outcome::{codes, Annotation, CharRange, ParseOutcome, Report};
use std::collections::HashSet;

/// HTTP methods accepted in action headings
const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE", "CONNECT", "LINK",
    "UNLINK",
];

/// Reference parser for the blueprint outline format
#[derive(Debug, Clone, Copy, Default)]
pub struct BlueprintParser;

impl BlueprintParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for BlueprintParser {
    fn parse(&self, job: &Job) -> ParseOutcome {
        match std::str::from_utf8(job.source()) {
            Ok(source) => Session::new(source, job.flags()).run(),
            Err(e) => {
                let index = e.valid_up_to();
                let line = job.source()[..index].iter().filter(|b| **b == b'\n').count() + 1;
                let mut outcome = ParseOutcome::default();
                outcome.report.error = Some(
                    Annotation::new("source is not valid UTF-8", codes::APPLICATION_ERROR)
                        .at(CharRange::new(index, 1), line),
                );
                outcome
            }
        }
    }
}

/// Innermost open section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Metadata,
    Overview,
    Group,
    Resource,
    Action,
}

/// A line with its absolute byte offset and 1-based number
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    text: &'a str,
    offset: usize,
    number: usize,
}

impl<'a> Line<'a> {
    /// Range of `part`, which must be a subslice of this line
    fn range_of(&self, part: &str) -> CharRange {
        let start = part.as_ptr() as usize - self.text.as_ptr() as usize;
        CharRange::new(self.offset + start, part.len())
    }

    fn range(&self) -> CharRange {
        CharRange::new(self.offset, self.text.len())
    }
}

/// Result of a line handler; `Err` carries the error that stops the parse
type Step = Result<(), Annotation>;

struct Session<'a> {
    source: &'a str,
    flags: OptionFlags,
    ast: Blueprint,
    map: SourceMap,
    warnings: Vec<Annotation>,
    section: Section,
    uris: HashSet<String>,
}

impl<'a> Session<'a> {
    fn new(source: &'a str, flags: OptionFlags) -> Self {
        Self {
            source,
            flags,
            ast: Blueprint::default(),
            map: SourceMap::default(),
            warnings: Vec::new(),
            section: Section::Metadata,
            uris: HashSet::new(),
        }
    }

    fn run(mut self) -> ParseOutcome {
        let mut offset = 0;
        let mut error = None;

        for (index, raw) in self.source.split_inclusive('\n').enumerate() {
            let line = Line {
                text: raw.trim_end_matches(['\n', '\r']),
                offset,
                number: index + 1,
            };
            offset += raw.len();

            if let Err(annotation) = self.line(line) {
                error = Some(annotation);
                break;
            }
        }

        if error.is_none() {
            error = self.check_name();
        }
        self.finish(error)
    }

    fn line(&mut self, line: Line<'a>) -> Step {
        let trimmed = line.text.trim();
        match heading(trimmed) {
            Some((1, text)) => self.level_one(line, text),
            Some((2, text)) => self.resource(line, text),
            Some((3, text)) => self.action(line, text),
            _ => {
                self.text(line, trimmed);
                Ok(())
            }
        }
    }

    fn level_one(&mut self, line: Line<'a>, text: &'a str) -> Step {
        if let Some(name) = group_name(text) {
            self.ast.resource_groups.push(ResourceGroup {
                name: name.to_string(),
                ..ResourceGroup::default()
            });
            self.map.resource_groups.push(ResourceGroupMap {
                name: ranges_of(&line, name),
                ..ResourceGroupMap::default()
            });
            self.section = Section::Group;
        } else if self.ast.name.is_empty() && self.ast.resource_groups.is_empty() {
            self.ast.name = text.to_string();
            self.map.name = ranges_of(&line, text);
            self.section = Section::Overview;
        } else {
            self.text(line, line.text.trim());
        }
        Ok(())
    }

    fn resource(&mut self, line: Line<'a>, text: &'a str) -> Step {
        let (name, uri) = match bracketed(text) {
            Bracket::Closed { before, inner } => (before, inner),
            Bracket::Unterminated => {
                return Err(Annotation::new(
                    "missing closing bracket ']' in resource heading",
                    codes::SYMBOL_ERROR,
                )
                .at(line.range(), line.number));
            }
            Bracket::None if text.starts_with('/') => ("", text),
            Bracket::None => {
                self.text(line, line.text.trim());
                return Ok(());
            }
        };

        if !self.uris.insert(uri.to_string()) {
            self.warnings.push(
                Annotation::new(
                    format!("the resource '{}' is already defined", uri),
                    codes::DUPLICATE_WARNING,
                )
                .at(line.range_of(uri), line.number),
            );
        }

        let (group, group_map) = self.last_group();
        group.resources.push(Resource {
            name: name.to_string(),
            uri_template: uri.to_string(),
            ..Resource::default()
        });
        group_map.resources.push(ResourceMap {
            name: ranges_of(&line, name),
            uri_template: ranges_of(&line, uri),
            ..ResourceMap::default()
        });
        self.section = Section::Resource;
        Ok(())
    }

    fn action(&mut self, line: Line<'a>, text: &'a str) -> Step {
        let (name, method) = match bracketed(text) {
            Bracket::Closed { before, inner } => {
                if !HTTP_METHODS.contains(&inner) {
                    return Err(Annotation::new(
                        format!("unknown HTTP method '{}'", inner),
                        codes::BUSINESS_ERROR,
                    )
                    .at(line.range_of(inner), line.number));
                }
                (before, inner)
            }
            Bracket::Unterminated => {
                return Err(Annotation::new(
                    "missing closing bracket ']' in action heading",
                    codes::SYMBOL_ERROR,
                )
                .at(line.range(), line.number));
            }
            Bracket::None if HTTP_METHODS.contains(&text) => ("", text),
            Bracket::None => {
                self.text(line, line.text.trim());
                return Ok(());
            }
        };

        let has_resource = self
            .ast
            .resource_groups
            .last()
            .is_some_and(|g| !g.resources.is_empty());
        if !has_resource || self.section == Section::Group {
            return Err(Annotation::new(
                format!("action '{}' is not nested in a resource", method),
                codes::BUSINESS_ERROR,
            )
            .at(line.range(), line.number));
        }

        let (resource, resource_map) = self.last_resource();
        resource.actions.push(Action {
            name: name.to_string(),
            method: method.to_string(),
            ..Action::default()
        });
        resource_map.actions.push(ActionMap {
            name: ranges_of(&line, name),
            method: ranges_of(&line, method),
            ..ActionMap::default()
        });
        self.section = Section::Action;
        Ok(())
    }

    /// Metadata line or description text
    fn text(&mut self, line: Line<'a>, trimmed: &'a str) {
        if self.section == Section::Metadata {
            if let Some((key, value)) = metadata(trimmed) {
                self.ast.metadata.push(Metadata {
                    name: key.to_string(),
                    value: value.to_string(),
                });
                self.map.metadata.push(vec![line.range()]);
                return;
            }
            if trimmed.is_empty() {
                return;
            }
            self.section = Section::Overview;
        }

        let (description, ranges) = match self.section {
            Section::Metadata | Section::Overview => {
                (&mut self.ast.description, &mut self.map.description)
            }
            Section::Group => {
                let (group, map) = self.last_group();
                (&mut group.description, &mut map.description)
            }
            Section::Resource => {
                let (resource, map) = self.last_resource();
                (&mut resource.description, &mut map.description)
            }
            Section::Action => {
                let (action, map) = self.last_action();
                (&mut action.description, &mut map.description)
            }
        };

        if trimmed.is_empty() {
            if !description.is_empty() {
                description.push('\n');
            }
            return;
        }
        description.push_str(line.text);
        description.push('\n');
        ranges.push(line.range());
    }

    fn check_name(&mut self) -> Option<Annotation> {
        if !self.ast.name.is_empty() {
            return None;
        }
        let first = self.source.lines().next().unwrap_or("");
        let annotation = |code| {
            Annotation::new("expected API name, e.g. '# <API Name>'", code)
                .at(CharRange::new(0, first.len()), 1)
        };
        if self.flags.contains(OptionFlags::REQUIRE_BLUEPRINT_NAME) {
            return Some(annotation(codes::BUSINESS_ERROR));
        }
        self.warnings.push(annotation(codes::API_NAME_WARNING));
        None
    }

    fn finish(mut self, error: Option<Annotation>) -> ParseOutcome {
        trim(&mut self.ast.description);
        for (group, group_map) in self
            .ast
            .resource_groups
            .iter_mut()
            .zip(&self.map.resource_groups)
        {
            trim(&mut group.description);
            if group.resources.is_empty() && error.is_none() {
                let mut warning = Annotation::new(
                    format!("resource group '{}' has no resources", group.name),
                    codes::EMPTY_DEFINITION_WARNING,
                );
                if let Some(range) = group_map.name.first() {
                    warning = warning.at(*range, line_of(self.source, range.location));
                }
                self.warnings.push(warning);
            }

            for (resource, resource_map) in group.resources.iter_mut().zip(&group_map.resources) {
                trim(&mut resource.description);
                for action in &mut resource.actions {
                    trim(&mut action.description);
                }
                if resource.actions.is_empty() && error.is_none() {
                    let mut warning = Annotation::new(
                        format!("no actions defined for resource '{}'", resource.uri_template),
                        codes::EMPTY_DEFINITION_WARNING,
                    );
                    if let Some(range) = resource_map.uri_template.first() {
                        warning = warning.at(*range, line_of(self.source, range.location));
                    }
                    self.warnings.push(warning);
                }
            }
        }

        ParseOutcome {
            report: Report {
                error,
                warnings: self.warnings,
            },
            ast: self.ast,
            source_map: self.map,
        }
    }

    fn last_group(&mut self) -> (&mut ResourceGroup, &mut ResourceGroupMap) {
        if self.ast.resource_groups.is_empty() {
            self.ast.resource_groups.push(ResourceGroup::default());
            self.map.resource_groups.push(ResourceGroupMap::default());
        }
        let last = self.ast.resource_groups.len() - 1;
        (
            &mut self.ast.resource_groups[last],
            &mut self.map.resource_groups[last],
        )
    }

    fn last_resource(&mut self) -> (&mut Resource, &mut ResourceMap) {
        let (group, map) = self.last_group();
        let last = group.resources.len().saturating_sub(1);
        (&mut group.resources[last], &mut map.resources[last])
    }

    fn last_action(&mut self) -> (&mut Action, &mut ActionMap) {
        let (resource, map) = self.last_resource();
        let last = resource.actions.len().saturating_sub(1);
        (&mut resource.actions[last], &mut map.actions[last])
    }
}

/// `(level, text)` for an ATX heading
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim_end()))
}

fn group_name(text: &str) -> Option<&str> {
    if text == "Group" {
        return Some("");
    }
    text.strip_prefix("Group ").map(str::trim)
}

fn metadata(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim()))
}

enum Bracket<'a> {
    None,
    Unterminated,
    Closed { before: &'a str, inner: &'a str },
}

fn bracketed(text: &str) -> Bracket<'_> {
    let Some(open) = text.find('[') else {
        return Bracket::None;
    };
    match text[open + 1..].find(']') {
        Some(close) => Bracket::Closed {
            before: text[..open].trim(),
            inner: text[open + 1..open + 1 + close].trim(),
        },
        None => Bracket::Unterminated,
    }
}

fn ranges_of(line: &Line<'_>, part: &str) -> Ranges {
    if part.is_empty() {
        Vec::new()
    } else {
        vec![line.range_of(part)]
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

fn trim(description: &mut String) {
    let len = description.trim_end().len();
    description.truncate(len);
}
