//! Deterministic domain engines.
//!
//! Cheap, provider-free answers for queries the quick-respond path can settle
//! on its own: embedded arithmetic, the classic syllogism, and fixed framing
//! sentences for ethical and causal questions. Every engine returns `None`
//! when it has nothing to say.

use crate::patterns::Pattern;
use crate::routing::Domain;

static EXPRESSION: Pattern =
    Pattern::new(r"[-+]?\d+(?:\.\d+)?(?:\s*[-+*/^]\s*[-+]?\d+(?:\.\d+)?)+");
static SYLLOGISM: Pattern = Pattern::new(r"(?i)socrates.*mortal");
static ETHICAL: Pattern = Pattern::new(r"(?i)should|moral|ethical");
static CONDITIONAL: Pattern = Pattern::new(r"(?i)if .* then .*");

/// Run the engine registered for `domain`.
pub fn solve(domain: Domain, query: &str) -> Option<String> {
    match domain {
        Domain::Math => solve_math(query),
        Domain::Logic => assess_logic(query),
        Domain::Ethics => reason_ethics(query),
        Domain::Causal => analyze_causal(query),
        Domain::Philosophy | Domain::General => None,
    }
}

/// Evaluate the first arithmetic expression embedded in `query`.
///
/// Supports `+ - * / ^` with the usual precedence (`^` binds tightest and is
/// right-associative). Integral results print without a fractional part.
pub fn solve_math(query: &str) -> Option<String> {
    let found = EXPRESSION.regex()?.find(query)?;
    let value = evaluate(found.as_str())?;
    Some(format_number(value))
}

/// Known syllogisms.
pub fn assess_logic(query: &str) -> Option<String> {
    SYLLOGISM
        .is_match(query)
        .then(|| "Yes, Socrates is mortal.".to_string())
}

/// Framing sentence for normative questions.
pub fn reason_ethics(query: &str) -> Option<String> {
    ETHICAL
        .is_match(query)
        .then(|| "Compare utilitarian, deontological, and virtue ethics perspectives.".to_string())
}

/// Framing sentence for conditional questions.
pub fn analyze_causal(query: &str) -> Option<String> {
    CONDITIONAL
        .is_match(query)
        .then(|| "Consider cause-effect paths and counterfactuals.".to_string())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Arithmetic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().filter(|c| !c.is_whitespace()).peekable();
    while let Some(c) = chars.next() {
        let expects_operand = matches!(tokens.last(), None | Some(Token::Op(_)));
        if c.is_ascii_digit() || (expects_operand && (c == '-' || c == '+')) {
            let mut literal = String::from(c);
            while let Some(&next) = chars.peek() {
                if next.is_ascii_digit() || next == '.' {
                    literal.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Num(literal.parse().ok()?));
        } else if matches!(c, '+' | '-' | '*' | '/' | '^') {
            tokens.push(Token::Op(c));
        } else {
            return None;
        }
    }
    Some(tokens)
}

fn precedence(op: char) -> u8 {
    match op {
        '^' => 3,
        '*' | '/' => 2,
        _ => 1,
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Option<f64> {
    let value = match op {
        '+' => lhs + rhs,
        '-' => lhs - rhs,
        '*' => lhs * rhs,
        '/' if rhs == 0.0 => return None,
        '/' => lhs / rhs,
        '^' => lhs.powf(rhs),
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Precedence-climbing evaluation over the token list.
fn parse_expr(tokens: &[Token], pos: &mut usize, min_prec: u8) -> Option<f64> {
    let mut lhs = match tokens.get(*pos)? {
        Token::Num(n) => *n,
        Token::Op(_) => return None,
    };
    *pos += 1;

    while let Some(Token::Op(op)) = tokens.get(*pos) {
        let prec = precedence(*op);
        if prec < min_prec {
            break;
        }
        *pos += 1;
        let next_min = if *op == '^' { prec } else { prec + 1 };
        let rhs = parse_expr(tokens, pos, next_min)?;
        lhs = apply(*op, lhs, rhs)?;
    }
    Some(lhs)
}

fn evaluate(expr: &str) -> Option<f64> {
    let tokens = tokenize(expr)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos, 1)?;
    (pos == tokens.len()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_math_embedded_expression() {
        assert_eq!(solve_math("What is 2 + 2?"), Some("4".to_string()));
        assert_eq!(solve_math("compute 12*3 please"), Some("36".to_string()));
    }

    #[test]
    fn test_solve_math_precedence() {
        assert_eq!(solve_math("2+3*4"), Some("14".to_string()));
        assert_eq!(solve_math("2^3^2"), Some("512".to_string()));
        assert_eq!(solve_math("10 - 4 - 3"), Some("3".to_string()));
        assert_eq!(solve_math("7/2"), Some("3.5".to_string()));
        assert_eq!(solve_math("-3 + 5"), Some("2".to_string()));
    }

    #[test]
    fn test_solve_math_rejects_division_by_zero_and_plain_text() {
        assert_eq!(solve_math("1/0"), None);
        assert_eq!(solve_math("no numbers here"), None);
        assert_eq!(solve_math("just 42"), None);
    }

    #[test]
    fn test_assess_logic() {
        assert_eq!(
            assess_logic("All men are mortal. Socrates is a man. Is Socrates mortal?"),
            Some("Yes, Socrates is mortal.".to_string())
        );
        assert_eq!(assess_logic("Is Plato wise?"), None);
    }

    #[test]
    fn test_framing_engines() {
        assert!(reason_ethics("Should we lie?").is_some());
        assert!(analyze_causal("if it rains then the grass is wet").is_some());
        assert!(analyze_causal("rain makes grass wet").is_none());
    }

    #[test]
    fn test_solve_dispatches_by_domain() {
        assert_eq!(solve(Domain::Math, "3 * 3"), Some("9".to_string()));
        assert_eq!(solve(Domain::Philosophy, "3 * 3"), None);
        assert_eq!(solve(Domain::General, "Socrates mortal"), None);
    }
}
