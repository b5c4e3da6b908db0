//! Line-oriented parser turning rule text into [`Rule`] records.
use super::lexer::{Token, TokenKind, tokenize};
use super::{Rule, RuleKind, RulePlatform};
use crate::error::{RuleSyntaxError, RuleSyntaxErrorKind};

/// Result of parsing a rules text: the valid rules plus one error per
/// rejected line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRules {
    /// Rules in file order.
    pub rules: Vec<Rule>,
    /// Lines that were skipped.
    pub errors: Vec<RuleSyntaxError>,
}

/// Parse a whole rules text.
///
/// Blank lines and `#` comments are ignored.  An invalid line never aborts
/// parsing; it is recorded in [`ParsedRules::errors`] and the remaining lines
/// are still read.
#[must_use]
pub fn parse(text: &str) -> ParsedRules {
    let mut parsed = ParsedRules::default();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line, line_no) {
            Ok(rule) => parsed.rules.push(rule),
            Err(kind) => parsed.errors.push(RuleSyntaxError {
                line: line_no,
                kind,
            }),
        }
    }
    parsed
}

/// Parse one non-blank, non-comment line.
fn parse_line(line: &str, line_no: usize) -> Result<Rule, RuleSyntaxErrorKind> {
    let mut tokens = tokenize(line);

    let platform = match tokens.last() {
        Some(last) if last.kind == TokenKind::Platform => {
            let tag = last.text.trim_start_matches('@');
            let platform = tag
                .parse::<RulePlatform>()
                .map_err(|()| RuleSyntaxErrorKind::UnknownPlatform(tag.to_string()))?;
            tokens.pop();
            platform
        }
        _ => RulePlatform::All,
    };
    if let Some(stray) = tokens.iter().find(|t| t.kind == TokenKind::Platform) {
        return Err(RuleSyntaxErrorKind::MisplacedPlatform(
            stray.text.trim_start_matches('@').to_string(),
        ));
    }

    let (type_token, rest) = tokens
        .split_first()
        .ok_or(RuleSyntaxErrorKind::MissingSource)?;
    let kind = type_token
        .text
        .parse::<RuleKind>()
        .map_err(|()| RuleSyntaxErrorKind::UnknownType(type_token.text.to_string()))?;

    let arrows: Vec<usize> = rest
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind == TokenKind::Arrow)
        .map(|(i, _)| i)
        .collect();
    if arrows.len() > 1 {
        return Err(RuleSyntaxErrorKind::MultipleArrows);
    }

    let (source_tokens, dest_tokens) = match arrows.first() {
        Some(&at) => (
            rest.get(..at).unwrap_or_default(),
            Some(rest.get(at + 1..).unwrap_or_default()),
        ),
        None => (rest, None),
    };

    let source = join_span(line, source_tokens).ok_or(RuleSyntaxErrorKind::MissingSource)?;
    let destination = match dest_tokens {
        Some(tokens) => join_span(line, tokens).ok_or(RuleSyntaxErrorKind::EmptyDestination)?,
        None => String::new(),
    };

    let rule = Rule {
        kind,
        source,
        destination,
        platform,
        line: line_no,
    };
    if rule.source_escapes_root() {
        return Err(RuleSyntaxErrorKind::SourceOutsideRoot(rule.source));
    }
    Ok(rule)
}

/// Slice the original text covered by `tokens`, preserving inner spacing.
fn join_span(line: &str, tokens: &[Token<'_>]) -> Option<String> {
    let first = tokens.first()?;
    let last = tokens.last()?;
    line.get(first.span.start..last.span.end)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn one(line: &str) -> Rule {
        let parsed = parse(line);
        assert!(parsed.errors.is_empty(), "unexpected errors: {:?}", parsed.errors);
        assert_eq!(parsed.rules.len(), 1);
        parsed.rules[0].clone()
    }

    fn error(line: &str) -> RuleSyntaxErrorKind {
        let parsed = parse(line);
        assert!(parsed.rules.is_empty(), "expected no rules: {:?}", parsed.rules);
        assert_eq!(parsed.errors.len(), 1);
        parsed.errors[0].kind.clone()
    }

    #[test]
    fn file_without_destination() {
        let rule = one("file .gitconfig");
        assert_eq!(rule.kind, RuleKind::File);
        assert_eq!(rule.source, ".gitconfig");
        assert_eq!(rule.destination, "");
        assert_eq!(rule.platform, RulePlatform::All);
    }

    #[test]
    fn children_with_destination_and_platform() {
        let rule = one("children .config -> $XDG_CONFIG @linux");
        assert_eq!(rule.kind, RuleKind::Children);
        assert_eq!(rule.source, ".config");
        assert_eq!(rule.destination, "$XDG_CONFIG");
        assert_eq!(rule.platform, RulePlatform::Linux);
    }

    #[test]
    fn dir_rule_for_macos() {
        let rule = one("dir hammerspoon -> $HOME/.hammerspoon @macos");
        assert_eq!(rule.kind, RuleKind::Directory);
        assert_eq!(rule.platform, RulePlatform::MacOs);
    }

    #[test]
    fn explicit_all_platform() {
        assert_eq!(one("file .vimrc @all").platform, RulePlatform::All);
    }

    #[test]
    fn destination_keeps_inner_spaces() {
        let rule = one("file vscode/settings.json -> $HOME/Library/Application Support/Code/User/settings.json @macos");
        assert_eq!(
            rule.destination,
            "$HOME/Library/Application Support/Code/User/settings.json"
        );
    }

    #[test]
    fn source_outside_root_is_rejected() {
        assert_eq!(
            error("file /etc/passwd -> $HOME/passwd"),
            RuleSyntaxErrorKind::SourceOutsideRoot("/etc/passwd".to_string())
        );
        assert_eq!(
            error("dir ../secrets"),
            RuleSyntaxErrorKind::SourceOutsideRoot("../secrets".to_string())
        );
        assert_eq!(
            error("file zsh/../../x"),
            RuleSyntaxErrorKind::SourceOutsideRoot("zsh/../../x".to_string())
        );
    }

    #[test]
    fn dotdot_staying_inside_root_is_accepted() {
        assert_eq!(one("file zsh/../.zshrc").source, "zsh/../.zshrc");
    }

    #[test]
    fn arrow_without_spaces() {
        let rule = one("file a->b");
        assert_eq!(rule.source, "a");
        assert_eq!(rule.destination, "b");
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let parsed = parse("# header\n\n   # indented comment\nfile .zshrc\n\n");
        assert_eq!(parsed.rules.len(), 1);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn line_numbers_are_recorded() {
        let parsed = parse("# c\nfile .a\n\nfile .b\n");
        assert_eq!(parsed.rules[0].line, 2);
        assert_eq!(parsed.rules[1].line, 4);
    }

    #[test]
    fn crlf_line_endings() {
        let parsed = parse("file .a\r\nfile .b\r\n");
        assert_eq!(parsed.rules.len(), 2);
        assert_eq!(parsed.rules[1].source, ".b");
    }

    #[test]
    fn type_only_is_missing_source() {
        assert_eq!(error("file"), RuleSyntaxErrorKind::MissingSource);
    }

    #[test]
    fn type_only_with_platform_is_missing_source() {
        assert_eq!(error("file @linux"), RuleSyntaxErrorKind::MissingSource);
    }

    #[test]
    fn unknown_type() {
        assert_eq!(
            error("link .zshrc"),
            RuleSyntaxErrorKind::UnknownType("link".to_string())
        );
    }

    #[test]
    fn single_token_is_invalid() {
        assert_eq!(
            error(".zshrc"),
            RuleSyntaxErrorKind::UnknownType(".zshrc".to_string())
        );
    }

    #[test]
    fn unknown_platform() {
        assert_eq!(
            error("file .zshrc @windows"),
            RuleSyntaxErrorKind::UnknownPlatform("windows".to_string())
        );
    }

    #[test]
    fn misplaced_platform() {
        assert_eq!(
            error("file @linux .zshrc"),
            RuleSyntaxErrorKind::MisplacedPlatform("linux".to_string())
        );
    }

    #[test]
    fn empty_destination() {
        assert_eq!(error("file .zshrc ->"), RuleSyntaxErrorKind::EmptyDestination);
    }

    #[test]
    fn arrow_without_source() {
        assert_eq!(error("file -> ~/.zshrc"), RuleSyntaxErrorKind::MissingSource);
    }

    #[test]
    fn multiple_arrows() {
        assert_eq!(error("file a -> b -> c"), RuleSyntaxErrorKind::MultipleArrows);
    }

    #[test]
    fn bad_line_does_not_stop_parsing() {
        let parsed = parse("file .a\nbogus line here\nfile .b\nfile\nchildren .config");
        assert_eq!(parsed.rules.len(), 3);
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].line, 2);
        assert_eq!(parsed.errors[1].line, 4);
    }

    #[test]
    fn display_round_trips_through_parser() {
        let text = "children .config -> $XDG_CONFIG @linux";
        assert_eq!(one(text).to_string(), text);
    }
}
