//! Expansion parsing
//!
//! Dispatches on the character after `$` and produces a single token part
//! per expansion, preserving the full source text for command and arithmetic
//! substitutions and the bare name for variables.

use crate::lexer::config::LexerConfig;
use crate::lexer::helpers;
use crate::lexer::position::PositionTracker;
use crate::lexer::token::{ExpansionKind, QuoteKind, TokenPart};

/// Parse the expansion starting at `pos` (which must point at `$`).
///
/// Returns the part and the position after the expansion. When the `$` is
/// not followed by anything expandable (`$ `, `$.`), a literal `$` part is
/// returned so the character survives verbatim. When the relevant feature is
/// disabled in the config, the part carries an error message and the driver
/// decides whether to diagnose or degrade to a literal.
pub fn parse_expansion(
    input: &[char],
    pos: usize,
    quote: Option<QuoteKind>,
    tracker: &PositionTracker,
    config: &LexerConfig,
) -> (TokenPart, usize) {
    debug_assert!(input[pos] == '$');
    let start = pos;
    let next = input.get(pos + 1).copied();

    match next {
        // $(( arithmetic )) — checked before $( command sub
        Some('(') if input.get(pos + 2) == Some(&'(') => {
            if !config.enable_arithmetic_expansion {
                return disabled(input, start, pos + 1, "arithmetic expansion", tracker, quote);
            }
            let (end, found) = helpers::find_balanced_double_parentheses(input, pos + 3);
            let value: String = input[start..end].iter().collect();
            let kind = if found {
                ExpansionKind::Arithmetic
            } else {
                ExpansionKind::ArithmeticUnclosed
            };
            let mut part =
                TokenPart::expansion(value, kind, tracker.position(start), tracker.position(end));
            part.quote = quote;
            if !found {
                part.error = Some("unclosed arithmetic expansion".to_string());
            }
            (part, end)
        }

        // $( command substitution )
        Some('(') => {
            if !config.enable_command_substitution {
                return disabled(input, start, pos + 1, "command substitution", tracker, quote);
            }
            let (end, found) = helpers::find_balanced_parentheses(input, pos + 2, true);
            let value: String = input[start..end].iter().collect();
            let kind = if found { ExpansionKind::Command } else { ExpansionKind::CommandUnclosed };
            let mut part =
                TokenPart::expansion(value, kind, tracker.position(start), tracker.position(end));
            part.quote = quote;
            if !found {
                part.error = Some("unclosed command substitution".to_string());
            }
            (part, end)
        }

        // ${ parameter expansion }
        Some('{') => {
            if !config.enable_parameter_expansion {
                return disabled(input, start, pos + 1, "parameter expansion", tracker, quote);
            }
            let (content, end, found) = helpers::validate_brace_expansion(input, pos + 2);
            let kind = if found {
                ExpansionKind::Parameter
            } else {
                ExpansionKind::ParameterUnclosed
            };
            let mut part =
                TokenPart::expansion(content, kind, tracker.position(start), tracker.position(end));
            part.quote = quote;
            if !found {
                part.error = Some("unclosed parameter expansion".to_string());
            }
            (part, end)
        }

        // $NAME or special variable
        _ => {
            if !config.enable_variable_expansion {
                return disabled(input, start, pos + 1, "variable expansion", tracker, quote);
            }
            let posix_names = config.posix_mode || !config.unicode_identifiers;
            let (name, end) = helpers::extract_variable_name(input, pos + 1, posix_names);
            if name.is_empty() {
                // Bare $: literal, not an expansion
                let mut part = TokenPart::literal(
                    "$",
                    tracker.position(start),
                    tracker.position(start + 1),
                );
                part.quote = quote;
                return (part, start + 1);
            }
            let mut part = TokenPart::expansion(
                name,
                ExpansionKind::Variable,
                tracker.position(start),
                tracker.position(end),
            );
            part.quote = quote;
            (part, end)
        }
    }
}

fn disabled(
    input: &[char],
    start: usize,
    end: usize,
    feature: &str,
    tracker: &PositionTracker,
    quote: Option<QuoteKind>,
) -> (TokenPart, usize) {
    let value: String = input[start..end].iter().collect();
    let mut part = TokenPart::literal(value, tracker.position(start), tracker.position(end));
    part.quote = quote;
    part.error = Some(format!("{} is disabled", feature));
    (part, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> (TokenPart, usize) {
        parse_with(s, &LexerConfig::default())
    }

    fn parse_with(s: &str, config: &LexerConfig) -> (TokenPart, usize) {
        let chars: Vec<char> = s.chars().collect();
        let tracker = PositionTracker::new(&chars);
        parse_expansion(&chars, 0, None, &tracker, config)
    }

    #[test]
    fn test_simple_variable() {
        let (part, end) = parse("$USER rest");
        assert_eq!(part.value, "USER");
        assert_eq!(part.expansion, Some(ExpansionKind::Variable));
        assert!(part.is_variable);
        assert_eq!(end, 5);
    }

    #[test]
    fn test_special_variable() {
        let (part, end) = parse("$?; echo");
        assert_eq!(part.value, "?");
        assert_eq!(end, 2);
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        let (part, end) = parse("$ x");
        assert_eq!(part.value, "$");
        assert!(!part.is_expansion);
        assert_eq!(end, 1);
    }

    #[test]
    fn test_parameter_expansion() {
        let (part, end) = parse("${VAR:-default} tail");
        assert_eq!(part.value, "VAR:-default");
        assert_eq!(part.expansion, Some(ExpansionKind::Parameter));
        assert_eq!(end, 15);
    }

    #[test]
    fn test_parameter_expansion_nested_braces() {
        let (part, end) = parse("${A:-${B}}");
        assert_eq!(part.value, "A:-${B}");
        assert_eq!(end, 10);
    }

    #[test]
    fn test_unclosed_parameter_expansion() {
        let (part, _) = parse("${VAR");
        assert_eq!(part.expansion, Some(ExpansionKind::ParameterUnclosed));
        assert!(part.error.is_some());
    }

    #[test]
    fn test_command_substitution() {
        let (part, end) = parse("$(echo hi) tail");
        assert_eq!(part.value, "$(echo hi)");
        assert_eq!(part.expansion, Some(ExpansionKind::Command));
        assert_eq!(end, 10);
    }

    #[test]
    fn test_command_substitution_quote_aware() {
        let (part, _) = parse("$(echo ')')");
        assert_eq!(part.value, "$(echo ')')");
        assert_eq!(part.expansion, Some(ExpansionKind::Command));
    }

    #[test]
    fn test_arithmetic_expansion() {
        let (part, end) = parse("$((1 + 2)) tail");
        assert_eq!(part.value, "$((1 + 2))");
        assert_eq!(part.expansion, Some(ExpansionKind::Arithmetic));
        assert_eq!(end, 10);
    }

    #[test]
    fn test_arithmetic_with_nested_parens() {
        let (part, _) = parse("$((1 + $(echo 2) * (3 + 4)))");
        assert_eq!(part.value, "$((1 + $(echo 2) * (3 + 4)))");
        assert_eq!(part.expansion, Some(ExpansionKind::Arithmetic));
    }

    #[test]
    fn test_unclosed_command_substitution() {
        let (part, _) = parse("$(echo hi");
        assert_eq!(part.expansion, Some(ExpansionKind::CommandUnclosed));
        assert!(part.error.is_some());
    }

    #[test]
    fn test_disabled_feature_yields_error_part() {
        let config = LexerConfig {
            enable_command_substitution: false,
            ..LexerConfig::default()
        };
        let (part, end) = parse_with("$(echo hi)", &config);
        assert!(!part.is_expansion);
        assert!(part.error.is_some());
        assert_eq!(part.value, "$");
        assert_eq!(end, 1);
    }
}
