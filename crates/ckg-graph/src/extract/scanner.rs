//! Line scanner shared by the heuristic (non-grammar) extractors.
//!
//! Splits C-family source into lines with comments removed and string
//! literal contents blanked, and tracks brace depth so declarations can be
//! attributed to their enclosing body.

/// One source line after comment and string removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    /// 1-indexed line number.
    pub number: usize,
    /// Code with comments removed and string contents emptied (`"abc"` -> `""`).
    pub code: String,
    /// The untouched line.
    pub raw: String,
    /// Brace depth before the first character of the line.
    pub depth: usize,
    /// Brace depth after the last character of the line.
    pub depth_after: usize,
}

impl ScannedLine {
    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    /// Nesting level of block comments (Kotlin and Dart both nest them).
    BlockComment(usize),
    Str { quote: char, triple: bool, raw: bool },
}

/// Scan source into cleaned lines.
pub fn scan(source: &str) -> Vec<ScannedLine> {
    let mut lines = Vec::new();
    let mut state = State::Code;
    let mut depth: usize = 0;

    for (idx, raw) in source.lines().enumerate() {
        let chars: Vec<char> = raw.chars().collect();
        let mut code = String::with_capacity(raw.len());
        let start_depth = depth;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match state {
                State::Code => {
                    if c == '/' && next == Some('/') {
                        break;
                    }
                    if c == '/' && next == Some('*') {
                        state = State::BlockComment(1);
                        i += 2;
                        continue;
                    }
                    if c == '"' || c == '\'' {
                        let triple = next == Some(c) && chars.get(i + 2).copied() == Some(c);
                        let raw_prefix = i > 0
                            && chars[i - 1] == 'r'
                            && (i < 2 || !is_ident_char(chars[i - 2]));
                        state = State::Str {
                            quote: c,
                            triple,
                            raw: raw_prefix,
                        };
                        code.push(c);
                        i += if triple { 3 } else { 1 };
                        continue;
                    }
                    if c == '{' {
                        depth += 1;
                    } else if c == '}' {
                        depth = depth.saturating_sub(1);
                    }
                    code.push(c);
                    i += 1;
                }
                State::BlockComment(level) => {
                    if c == '*' && next == Some('/') {
                        state = if level > 1 {
                            State::BlockComment(level - 1)
                        } else {
                            State::Code
                        };
                        i += 2;
                    } else if c == '/' && next == Some('*') {
                        state = State::BlockComment(level + 1);
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                State::Str { quote, triple, raw } => {
                    if c == '\\' && !raw {
                        i += 2;
                        continue;
                    }
                    if c == quote {
                        if !triple {
                            code.push(c);
                            state = State::Code;
                            i += 1;
                            continue;
                        }
                        if next == Some(quote) && chars.get(i + 2).copied() == Some(quote) {
                            code.push(c);
                            state = State::Code;
                            i += 3;
                            continue;
                        }
                    }
                    i += 1;
                }
            }
        }

        // Single-line strings never span lines, even when left unterminated.
        if let State::Str { quote, triple: false, .. } = state {
            code.push(quote);
            state = State::Code;
        }

        lines.push(ScannedLine {
            number: idx + 1,
            code,
            raw: raw.to_string(),
            depth: start_depth,
            depth_after: depth,
        });
    }

    lines
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Join a declaration header that continues over several lines.
///
/// Starting at `start`, lines are appended while parentheses or angle
/// brackets are unbalanced. Returns the joined code and the index of the
/// last line consumed.
pub fn collect_header(lines: &[ScannedLine], start: usize) -> (String, usize) {
    let mut text = String::new();
    let mut parens: i32 = 0;
    let mut end = start;

    for (offset, line) in lines[start..].iter().enumerate().take(40) {
        if offset > 0 {
            text.push(' ');
        }
        text.push_str(line.code.trim());
        end = start + offset;
        for c in line.code.chars() {
            match c {
                '(' => parens += 1,
                ')' => parens -= 1,
                _ => {}
            }
        }
        if parens <= 0 {
            break;
        }
    }

    (text, end)
}

/// Index of the line that closes the block opened on or after `header_end`.
///
/// Returns `header_end` when the header opens no block (abstract members,
/// expression bodies, forward declarations).
pub fn block_end(lines: &[ScannedLine], header_start: usize, header_end: usize) -> usize {
    let base = lines[header_start].depth;
    if lines[header_end].depth_after <= base {
        return header_end;
    }
    for (idx, line) in lines.iter().enumerate().skip(header_end + 1) {
        if line.depth_after <= base {
            return idx;
        }
    }
    lines.len().saturating_sub(1)
}

/// Split on `sep` at nesting level zero of `()`, `<>`, `[]` and `{}`.
pub fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut level: i32 = 0;

    for c in text.chars() {
        match c {
            '(' | '<' | '[' | '{' => level += 1,
            ')' | '>' | ']' | '}' => level -= 1,
            _ => {}
        }
        if c == sep && level == 0 {
            let part = current.trim().to_string();
            if !part.is_empty() {
                parts.push(part);
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    let part = current.trim().to_string();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

/// Index of the parenthesis matching the one at `open`, if balanced.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut level = 0i32;
    for (idx, c) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => level += 1,
            ')' => {
                level -= 1;
                if level == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Leading identifier of `text` (after trimming), if any.
pub fn leading_ident(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if end == 0 { None } else { Some(&text[..end]) }
}

/// Split leading annotations off a declaration.
///
/// `@Deprecated("x") @field:Json(name = "id") val id` yields
/// `(["Deprecated", "Json"], "val id")`. Use-site targets are dropped.
pub fn strip_annotations(code: &str) -> (Vec<String>, &str) {
    let mut annotations = Vec::new();
    let mut rest = code.trim_start();

    while let Some(after_at) = rest.strip_prefix('@') {
        let end = after_at
            .char_indices()
            .find(|(_, c)| !(is_ident_char(*c) || *c == '.' || *c == ':'))
            .map(|(i, _)| i)
            .unwrap_or(after_at.len());
        if end == 0 {
            break;
        }
        let full = &after_at[..end];
        let name = full.rsplit(':').next().unwrap_or(full);
        let name = name.rsplit('.').next().unwrap_or(name);
        annotations.push(name.to_string());

        let mut remaining = &after_at[end..];
        if remaining.trim_start().starts_with('(') {
            let offset = remaining.len() - remaining.trim_start().len();
            match matching_paren(remaining, offset) {
                Some(close) => remaining = &remaining[close + 1..],
                None => remaining = "",
            }
        }
        rest = remaining.trim_start();
    }

    (annotations, rest)
}

/// Strip generic arguments and nullability from a type reference.
pub fn base_type_name(text: &str) -> String {
    let text = text.trim();
    let base = text.split('<').next().unwrap_or(text);
    base.split('(')
        .next()
        .unwrap_or(base)
        .trim()
        .trim_end_matches('?')
        .trim()
        .to_string()
}

/// Count whole-word occurrences of `keywords` plus short-circuit operators.
pub fn count_decisions(code: &str, keywords: &[&str]) -> usize {
    let mut count = code.matches("&&").count() + code.matches("||").count();
    let chars: Vec<(usize, char)> = code.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (start, c) = chars[i];
        if is_ident_char(c) {
            let mut j = i;
            while j < chars.len() && is_ident_char(chars[j].1) {
                j += 1;
            }
            let end = chars.get(j).map(|(idx, _)| *idx).unwrap_or(code.len());
            if keywords.contains(&&code[start..end]) {
                count += 1;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    count
}

/// Heuristic call detection: `name(` or `qualifier.name(`.
///
/// Returns `(qualifier, callee)` pairs; identifiers in `skip` (control-flow
/// keywords, declaration keywords) are never reported.
pub fn find_calls(code: &str, skip: &[&str]) -> Vec<(Option<String>, String)> {
    let chars: Vec<char> = code.chars().collect();
    let mut calls = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !is_ident_char(chars[i]) || (i > 0 && is_ident_char(chars[i - 1])) {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        let name: String = chars[start..i].iter().collect();
        let mut k = i;
        while k < chars.len() && chars[k] == ' ' {
            k += 1;
        }
        if k >= chars.len() || chars[k] != '(' {
            continue;
        }
        if name.chars().next().is_some_and(|c| c.is_ascii_digit()) || skip.contains(&name.as_str()) {
            continue;
        }

        // Qualifier: identifier immediately before a `.`/`?.` preceding the name.
        let mut q_end = start;
        let mut qualifier = None;
        if q_end > 0 && chars[q_end - 1] == '.' {
            q_end -= 1;
            if q_end > 0 && chars[q_end - 1] == '?' {
                q_end -= 1;
            }
            let mut q_start = q_end;
            while q_start > 0 && is_ident_char(chars[q_start - 1]) {
                q_start -= 1;
            }
            if q_start < q_end {
                qualifier = Some(chars[q_start..q_end].iter().collect());
            } else {
                qualifier = Some(String::new());
            }
        }
        calls.push((qualifier, name));
    }

    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_line_and_block_comments() {
        let source = "val a = 1 // class Hidden\n/* fun hidden() {\n}\n*/ fun shown() {}\n";
        let lines = scan(source);
        assert_eq!(lines[0].code.trim(), "val a = 1");
        assert!(lines[1].is_blank());
        assert!(lines[2].is_blank());
        assert_eq!(lines[3].code.trim(), "fun shown() {}");
        assert_eq!(lines[3].depth, 0);
        assert_eq!(lines[3].depth_after, 0);
    }

    #[test]
    fn test_nested_block_comments() {
        let lines = scan("/* outer /* inner */ still comment */ class A");
        assert_eq!(lines[0].code.trim(), "class A");
    }

    #[test]
    fn test_blanks_string_contents() {
        let lines = scan(r#"val s = "class Fake { \" }" + 'x'"#);
        assert_eq!(lines[0].code, r#"val s = "" + ''"#);
        assert_eq!(lines[0].depth_after, 0);
    }

    #[test]
    fn test_triple_quoted_strings_span_lines() {
        let source = "val s = \"\"\"\nclass Inside {\n\"\"\"\nclass Outside";
        let lines = scan(source);
        assert!(!lines[1].code.contains("class"));
        assert_eq!(lines[3].code.trim(), "class Outside");
        assert_eq!(lines[3].depth, 0);
    }

    #[test]
    fn test_dart_raw_string() {
        let lines = scan(r"final p = r'C:\dir\' ; class B {}");
        assert!(lines[0].code.contains("class B"));
    }

    #[test]
    fn test_depth_tracking() {
        let source = "class A {\n  fun f() {\n    x()\n  }\n}\n";
        let lines = scan(source);
        let depths: Vec<_> = lines.iter().map(|l| l.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 2, 1]);
        assert_eq!(block_end(&lines, 0, 0), 4);
        assert_eq!(block_end(&lines, 1, 1), 3);
        assert_eq!(block_end(&lines, 2, 2), 2);
    }

    #[test]
    fn test_collect_header() {
        let lines = scan("data class User(\n  val name: String,\n  val age: Int\n) : Base()\nfun x() {}");
        let (header, end) = collect_header(&lines, 0);
        assert_eq!(end, 3);
        assert!(header.contains("val age: Int"));
        assert!(header.ends_with(": Base()"));
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("Base(1, 2), Map<K, V>, Other", ','),
            vec!["Base(1, 2)", "Map<K, V>", "Other"]
        );
    }

    #[test]
    fn test_find_calls() {
        let calls = find_calls("if (ok) repo.save(user) else log(msg)", &["if"]);
        assert_eq!(
            calls,
            vec![
                (Some("repo".to_string()), "save".to_string()),
                (None, "log".to_string())
            ]
        );
    }

    #[test]
    fn test_count_decisions() {
        let n = count_decisions("if (a && b) { for (x in y) {} } else if (c) {}", &["if", "for"]);
        assert_eq!(n, 4);
    }

    #[test]
    fn test_strip_annotations() {
        let (annotations, rest) =
            strip_annotations(r#"@Deprecated("x") @field:Json(name = "id") val id: Int"#);
        assert_eq!(annotations, vec!["Deprecated", "Json"]);
        assert_eq!(rest, "val id: Int");

        let (annotations, rest) = strip_annotations("@override\n");
        assert_eq!(annotations, vec!["override"]);
        assert!(rest.is_empty());

        let (annotations, rest) = strip_annotations("fun f()");
        assert!(annotations.is_empty());
        assert_eq!(rest, "fun f()");
    }

    #[test]
    fn test_base_type_name() {
        assert_eq!(base_type_name(" List<String>? "), "List");
        assert_eq!(base_type_name("Base(1)"), "Base");
        assert_eq!(leading_ident("  foo(bar)"), Some("foo"));
        assert_eq!(matching_paren("a(b(c))d", 1), Some(6));
    }
}
