use super::*;
use crate::diag::Diagnostics;
use crate::world::MoleculeKind;

fn lex(source: &str) -> (Vec<Token>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let tokens = Lexer::tokenize("test.evo", source, &mut diags);
    (tokens, diags)
}

#[test]
fn test_basic_instruction_line() {
    let (tokens, diags) = lex("SETI %DR0 DATA:41\n");
    assert!(diags.is_empty());
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[0].text, "SETI");
    assert_eq!(tokens[1].kind, TokenKind::Register);
    assert_eq!(tokens[1].text, "%DR0");
    assert_eq!(tokens[2].kind, TokenKind::TypedLiteral(MoleculeKind::Data, 41));
    assert_eq!(tokens[2].text, "DATA:41");
    assert_eq!(tokens[3].kind, TokenKind::Newline);
    assert_eq!(tokens[4].kind, TokenKind::Eof);
}

#[test]
fn test_directives_labels_and_vectors() {
    let (tokens, diags) = lex(".ORG 5|5\nLOOP:\n.DIR 0|-1\n");
    assert!(diags.is_empty());
    assert_eq!(tokens[0].kind, TokenKind::Directive);
    assert_eq!(tokens[0].text, ".ORG");
    assert_eq!(tokens[1].kind, TokenKind::VectorLiteral(vec![5, 5]));
    assert_eq!(tokens[3].kind, TokenKind::Identifier);
    assert_eq!(tokens[3].text, "LOOP");
    assert_eq!(tokens[4].kind, TokenKind::Colon);
    assert_eq!(tokens[7].kind, TokenKind::VectorLiteral(vec![0, -1]));
    assert_eq!(tokens[7].text, "0|-1");
}

#[test]
fn test_numbers_and_negative_values() {
    let (tokens, _) = lex("SETI %DR0 -7\n");
    assert_eq!(tokens[2].kind, TokenKind::Number(-7));
    assert_eq!(tokens[2].text, "-7");

    let (tokens, _) = lex("SETI %DR0 ENERGY:-100\n");
    assert_eq!(tokens[2].kind, TokenKind::TypedLiteral(MoleculeKind::Energy, -100));
}

#[test]
fn test_comments_are_skipped() {
    let (tokens, diags) = lex("# header\nNOP # trailing\n");
    assert!(diags.is_empty());
    assert_eq!(tokens[0].kind, TokenKind::Newline);
    assert_eq!(tokens[1].text, "NOP");
    assert_eq!(tokens[2].kind, TokenKind::Newline);
}

#[test]
fn test_string_literal() {
    let (tokens, diags) = lex(".INCLUDE \"lib/util.evo\"\n");
    assert!(diags.is_empty());
    assert_eq!(tokens[1].kind, TokenKind::Str("lib/util.evo".to_string()));
    assert_eq!(tokens[1].text, "\"lib/util.evo\"");
}

#[test]
fn test_unterminated_string_reports() {
    let (_, diags) = lex(".INCLUDE \"oops\n");
    assert_eq!(diags.len(), 1);
}

#[test]
fn test_unexpected_char_recovers_at_newline() {
    let (tokens, diags) = lex("@@@ junk\nNOP\n");
    assert_eq!(diags.len(), 1);
    // Scanning resumes on the next line.
    assert!(tokens.iter().any(|t| t.text == "NOP"));
}

#[test]
fn test_qualified_identifier_keeps_dot() {
    let (tokens, _) = lex("CALL LIB.HELPER\n");
    assert_eq!(tokens[1].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].text, "LIB.HELPER");
}

#[test]
fn test_column_fidelity() {
    let source = "SETI %DR0 DATA:41\n  CALL INC WITH %DR0\n.PLACE STRUCTURE:1 3|4\n";
    let normalized = source.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.lines().collect();
    let (tokens, diags) = lex(source);
    assert!(diags.is_empty());
    for token in &tokens {
        if token.kind == TokenKind::Newline || token.kind == TokenKind::Eof {
            continue;
        }
        let line = lines[token.source.line as usize - 1];
        let col = token.source.column as usize - 1;
        assert_eq!(
            &line[col..col + token.text.len()],
            token.text,
            "token {token:?} does not match its source slice"
        );
    }
}

#[test]
fn test_crlf_is_normalized() {
    let (tokens, diags) = lex("NOP\r\nNOP\r\n");
    assert!(diags.is_empty());
    let count = tokens.iter().filter(|t| t.text == "NOP").count();
    assert_eq!(count, 2);
    assert_eq!(tokens[2].source.line, 2);
    assert_eq!(tokens[2].source.column, 1);
}
