//! The attribute pattern + command recognizer (§4.2 Input: "an attribute
//! parser").
//!
//! Attribute names are split as `target.command` (`title.bind`,
//! `click.trigger`, `repeat.for`). Everything here is string-shape
//! recognition; turning the recognized command into an [`Instruction`] or a
//! controller split happens in [`super::lower`].

use crate::template::instruction::BindingMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bind(BindingMode),
    Trigger,
    Capture,
    For,
    Ref,
    Style,
    Class,
    Attr,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAttrName {
    pub target: String,
    pub command: Command,
    /// An event-listener modifier parsed off the end (`keydown.trigger:self`).
    pub modifier: Option<String>,
}

const TEMPLATE_CONTROLLERS: &[&str] = &["if", "repeat", "switch", "with", "promise", "portal", "case", "default", "then", "catch", "pending"];

pub fn is_template_controller_name(target: &str) -> bool {
    TEMPLATE_CONTROLLERS.contains(&target)
}

/// Recognize `name` as `target.command[:modifier]`, falling back to a
/// shorthand prefix form (`.bind`, `.class`, `.style`) and finally to
/// `Command::None` for a plain attribute.
pub fn parse_attr_name(name: &str) -> ParsedAttrName {
    let (body, modifier) = match name.split_once(':') {
        Some((b, m)) => (b, Some(m.to_string())),
        None => (name, None),
    };

    if let Some(target) = body.strip_suffix(".bind") {
        return ParsedAttrName { target: target.to_string(), command: Command::Bind(BindingMode::ToView), modifier };
    }
    if let Some(target) = body.strip_suffix(".one-time") {
        return ParsedAttrName { target: target.to_string(), command: Command::Bind(BindingMode::OneTime), modifier };
    }
    if let Some(target) = body.strip_suffix(".to-view") {
        return ParsedAttrName { target: target.to_string(), command: Command::Bind(BindingMode::ToView), modifier };
    }
    if let Some(target) = body.strip_suffix(".from-view") {
        return ParsedAttrName { target: target.to_string(), command: Command::Bind(BindingMode::FromView), modifier };
    }
    if let Some(target) = body.strip_suffix(".two-way") {
        return ParsedAttrName { target: target.to_string(), command: Command::Bind(BindingMode::TwoWay), modifier };
    }
    if let Some(target) = body.strip_suffix(".for") {
        return ParsedAttrName { target: target.to_string(), command: Command::For, modifier };
    }
    if let Some(target) = body.strip_suffix(".resolve") {
        return ParsedAttrName { target: target.to_string(), command: Command::Bind(BindingMode::ToView), modifier };
    }
    if let Some(target) = body.strip_suffix(".trigger") {
        return ParsedAttrName { target: target.to_string(), command: Command::Trigger, modifier };
    }
    if let Some(target) = body.strip_suffix(".capture") {
        return ParsedAttrName { target: target.to_string(), command: Command::Capture, modifier };
    }
    if let Some(target) = body.strip_suffix(".ref") {
        return ParsedAttrName { target: target.to_string(), command: Command::Ref, modifier };
    }
    if body == "ref" {
        return ParsedAttrName { target: "element".to_string(), command: Command::Ref, modifier };
    }
    if let Some(target) = body.strip_prefix("style.") {
        return ParsedAttrName { target: target.to_string(), command: Command::Style, modifier };
    }
    if let Some(target) = body.strip_prefix("class.") {
        return ParsedAttrName { target: target.to_string(), command: Command::Class, modifier };
    }
    if let Some(target) = body.strip_prefix("attr.") {
        return ParsedAttrName { target: target.to_string(), command: Command::Attr, modifier };
    }

    ParsedAttrName { target: body.to_string(), command: Command::None, modifier }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_prop_bind() {
        let parsed = parse_attr_name("title.bind");
        assert_eq!(parsed.target, "title");
        assert_eq!(parsed.command, Command::Bind(BindingMode::ToView));
    }

    #[test]
    fn recognizes_event_trigger_with_modifier() {
        let parsed = parse_attr_name("keydown.trigger:self");
        assert_eq!(parsed.target, "keydown");
        assert_eq!(parsed.command, Command::Trigger);
        assert_eq!(parsed.modifier.as_deref(), Some("self"));
    }

    #[test]
    fn recognizes_repeat_for() {
        let parsed = parse_attr_name("repeat.for");
        assert_eq!(parsed.target, "repeat");
        assert_eq!(parsed.command, Command::For);
    }

    #[test]
    fn plain_attribute_has_no_command() {
        let parsed = parse_attr_name("class");
        assert_eq!(parsed.command, Command::None);
    }
}
