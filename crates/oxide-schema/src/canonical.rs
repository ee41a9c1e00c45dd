//! DDL canonicalization.
//!
//! Produces comparison keys for index definitions, column types and default
//! expressions so that spellings the database treats as equivalent compare
//! equal. String literals are masked before any rewriting and restored
//! verbatim afterwards. Input that does not look like an index definition
//! canonicalizes to its whitespace-collapsed, lower-cased form.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::ident::same_identifier;
use crate::model::{IndexDefinition, TableName};

/// Marks a masked string literal inside canonical text.
const MARK: char = '\u{1}';

static OPEN_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\s*").expect("open paren regex is valid"));
static CLOSE_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\)").expect("close paren regex is valid"));
static COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("comma regex is valid"));
static OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(<>|!=|<=|>=|=|<|>)\s*").expect("operator regex is valid")
});
static INDEX_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^create (unique )?index (?:concurrently )?(?:if not exists )?(\S+) on (?:only )?([^\s(]+)(.*)$",
    )
    .expect("index header regex is valid")
});
static ASC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" asc\b").expect("asc regex is valid"));
static NULLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<desc> desc)? nulls (?P<which>first|last)\b").expect("nulls regex is valid")
});
static WRAPPED_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<lead>[(,] ?)\((?P<col>[a-z_][a-z0-9_$]*)\)")
        .expect("wrapped column regex is valid")
});
static STORAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"with\(([^)]*)\)").expect("storage regex is valid"));

/// A type name as it appears after `::`.
const CAST_TYPE: &str = r"(?:character varying|double precision|timestamp(?: with(?:out)? time zone)?|time(?: with(?:out)? time zone)?|[a-z_][a-z0-9_]*)(?:\([0-9, ]*\))?(?:\[\])*";

static LITERAL_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?P<lit>\x01\d+\x01)::(?P<ty>{CAST_TYPE})"))
        .expect("literal cast regex is valid")
});
static NUMBER_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\((?P<num>-?[0-9]+(?:\.[0-9]+)?)\)::{CAST_TYPE}"))
        .expect("number cast regex is valid")
});
// Casts the catalog adds to text-like columns so they match text operators.
static COLUMN_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<col>\b[a-z_][a-z0-9_$]*)::(?:character varying|varchar|text|bpchar|name)(?:\([0-9]*\))?(?P<after>[^a-z0-9_\[]|$)",
    )
    .expect("column cast regex is valid")
});

// ================================================================
// Type synonyms
// ================================================================

/// A table of type-name aliases mapped to one canonical spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSynonyms {
    aliases: HashMap<String, String>,
}

impl TypeSynonyms {
    /// An empty table: every type is only equal to itself.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// PostgreSQL's built-in aliases.
    #[must_use]
    pub fn postgres() -> Self {
        const GROUPS: &[(&str, &[&str])] = &[
            ("int", &["integer", "int4", "serial", "serial4"]),
            ("bigint", &["int8", "bigserial", "serial8"]),
            ("smallint", &["int2", "smallserial", "serial2"]),
            ("boolean", &["bool"]),
            ("varchar", &["character varying"]),
            ("char", &["character", "bpchar"]),
            ("decimal", &["numeric"]),
            ("double", &["double precision", "float8", "float"]),
            ("real", &["float4"]),
            ("timestamp", &["timestamp without time zone"]),
            ("timestamptz", &["timestamp with time zone"]),
            ("time", &["time without time zone"]),
            ("timetz", &["time with time zone"]),
            ("varbit", &["bit varying"]),
        ];
        let mut synonyms = Self::empty();
        for (canonical, aliases) in GROUPS {
            for alias in *aliases {
                synonyms = synonyms.with(*alias, *canonical);
            }
        }
        synonyms
    }

    /// Adds an alias.
    #[must_use]
    pub fn with(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(
            alias.into().to_ascii_lowercase(),
            canonical.into().to_ascii_lowercase(),
        );
        self
    }

    /// Resolves a base type name (no modifiers) to its canonical spelling.
    #[must_use]
    pub fn resolve<'a>(&'a self, base: &'a str) -> &'a str {
        self.aliases.get(base).map_or(base, String::as_str)
    }

    /// Canonical spelling of a full type name, keeping length/precision
    /// modifiers and array suffixes: `CHARACTER VARYING(100)` becomes
    /// `varchar(100)`, `_int4` becomes `int[]`.
    #[must_use]
    pub fn canonical_type(&self, db_type: &str) -> String {
        let lowered = collapse_whitespace(&db_type.trim().to_ascii_lowercase()).replace('"', "");
        let mut rest = lowered.as_str();
        let mut array = String::new();
        while let Some(stripped) = rest.strip_suffix("[]") {
            array.push_str("[]");
            rest = stripped.trim_end();
        }
        if array.is_empty() {
            if let Some(element) = rest.strip_prefix('_') {
                array.push_str("[]");
                rest = element;
            }
        }
        let (base, modifier) = match (rest.find('('), rest.find(')')) {
            (Some(open), Some(close)) if close > open => {
                let modifier: String = rest[open..=close]
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let base = format!("{} {}", rest[..open].trim(), rest[close + 1..].trim());
                (base.trim().to_string(), modifier)
            }
            _ => (rest.to_string(), String::new()),
        };
        let base = self.resolve(&base);
        let modifier = if modifier.is_empty() && is_fixed_length(base) {
            "(1)".to_string()
        } else {
            modifier
        };
        format!("{base}{modifier}{array}")
    }

    /// The base name of a canonical type: `varchar(10)` → `varchar`.
    #[must_use]
    pub fn base_of(canonical: &str) -> &str {
        let end = canonical.find(['(', '[']).unwrap_or(canonical.len());
        canonical[..end].trim()
    }

    /// Numeric modifiers of a canonical type: `decimal(10,2)` → `[10, 2]`.
    #[must_use]
    pub fn modifiers_of(canonical: &str) -> Vec<u32> {
        let Some(open) = canonical.find('(') else {
            return Vec::new();
        };
        let Some(close) = canonical[open..].find(')') else {
            return Vec::new();
        };
        canonical[open + 1..open + close]
            .split(',')
            .filter_map(|n| n.trim().parse().ok())
            .collect()
    }
}

/// Fixed-length types whose bare name means a length of one.
fn is_fixed_length(base: &str) -> bool {
    matches!(base, "char" | "bit")
}

/// The integer type behind a serial pseudo-type, if `db_type` is one.
#[must_use]
pub fn serial_base(db_type: &str) -> Option<&'static str> {
    match db_type.trim().to_ascii_lowercase().as_str() {
        "serial" | "serial4" => Some("int"),
        "bigserial" | "serial8" => Some("bigint"),
        "smallserial" | "serial2" => Some("smallint"),
        _ => None,
    }
}

// ================================================================
// Canonicalizer
// ================================================================

/// Builds comparison keys for DDL fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalizer {
    synonyms: TypeSynonyms,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::postgres()
    }
}

impl Canonicalizer {
    /// Creates a canonicalizer with the given synonym table.
    #[must_use]
    pub const fn new(synonyms: TypeSynonyms) -> Self {
        Self { synonyms }
    }

    /// A canonicalizer with PostgreSQL's type aliases.
    #[must_use]
    pub fn postgres() -> Self {
        Self::new(TypeSynonyms::postgres())
    }

    /// The synonym table in use.
    #[must_use]
    pub const fn synonyms(&self) -> &TypeSynonyms {
        &self.synonyms
    }

    /// Canonical spelling of a column type.
    #[must_use]
    pub fn canonical_type(&self, db_type: &str) -> String {
        self.synonyms.canonical_type(db_type)
    }

    /// Returns `true` if two type names denote the same type.
    #[must_use]
    pub fn same_type(&self, a: &str, b: &str) -> bool {
        self.canonical_type(a) == self.canonical_type(b)
    }

    /// Canonical form of a default-value expression. Casts applied directly
    /// to literals are dropped, and quoted numeric literals are unquoted when
    /// cast to a numeric type.
    #[must_use]
    pub fn canonical_default(&self, expression: &str) -> String {
        let masked = Masked::new(expression);
        let code = masked.strip_literal_casts(&normalize_punctuation(&masked.code));
        let code = strip_outer_parens(code.trim());
        masked.restore(code)
    }

    /// Canonical form of an index as this crate would create it.
    #[must_use]
    pub fn canonicalize_index(&self, index: &IndexDefinition, table: &TableName) -> String {
        self.canonical_index_ddl(&index.to_ddl(table), table)
    }

    /// Canonical form of a `CREATE INDEX` statement on `table`, as written
    /// by hand or reported by the catalog.
    #[must_use]
    pub fn canonical_index_ddl(&self, ddl: &str, table: &TableName) -> String {
        let masked = Masked::new(ddl.trim().trim_end_matches(';'));
        let code = normalize_punctuation(&masked.code);
        let Some(caps) = INDEX_HEADER.captures(&code) else {
            return masked.restore(code.trim());
        };
        let unique = caps.get(1).map_or("", |m| m.as_str());
        let name = &caps[2];
        let target = normalize_table_reference(&caps[3], table);
        let mut rest = caps[4].to_string();

        if let Some(stripped) = rest.strip_prefix(" using btree") {
            if stripped.starts_with(['(', ' ']) {
                rest = stripped.to_string();
            }
        }
        rest = strip_qualifier(&rest, &format!("{}.{}.", lower(&table.schema), lower(&table.name)));
        rest = strip_qualifier(&rest, &format!("{}.", lower(&table.name)));
        rest = unwrap_columns(&rest);
        rest = masked.strip_literal_casts(&rest);
        rest = NUMBER_CAST.replace_all(&rest, "$num").into_owned();
        rest = strip_column_casts(&rest);
        rest = ASC.replace_all(&rest, "").into_owned();
        rest = NULLS
            .replace_all(&rest, |caps: &Captures| {
                let desc = caps.name("desc").is_some();
                match (desc, &caps["which"]) {
                    (true, "first") => " desc".to_string(),
                    (false, "last") => String::new(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned();
        rest = STORAGE
            .replace_all(&rest, |caps: &Captures| {
                let params: Vec<String> = caps[1]
                    .split(',')
                    .filter_map(|param| {
                        let (key, value) = param.split_once('=')?;
                        let value = value.trim();
                        let value = if value.starts_with(MARK) {
                            masked.literal_text(value).to_ascii_lowercase()
                        } else {
                            value.to_string()
                        };
                        Some(format!("{}={value}", key.trim()))
                    })
                    .collect();
                format!("with({})", params.join(", "))
            })
            .into_owned();
        if let Some(pos) = find_keyword(&rest, " where") {
            let predicate = strip_outer_parens(rest[pos + 6..].trim());
            rest = format!("{} where {predicate}", &rest[..pos]);
        }

        let code = format!("create {unique}index {name} on {target}{}", rest.trim_end());
        masked.restore(&code)
    }
}

// ================================================================
// Helpers
// ================================================================

/// SQL text with string literals replaced by numbered placeholders.
struct Masked {
    code: String,
    literals: Vec<String>,
}

impl Masked {
    /// Lower-cases and whitespace-collapses everything outside string
    /// literals. Double-quoted identifiers lose their quotes.
    fn new(sql: &str) -> Self {
        let mut code = String::with_capacity(sql.len());
        let mut literals = Vec::new();
        let mut pending_space = false;
        let mut chars = sql.chars().peekable();

        while let Some(c) = chars.next() {
            if c.is_whitespace() {
                pending_space = !code.is_empty();
                continue;
            }
            if pending_space {
                code.push(' ');
                pending_space = false;
            }
            match c {
                '\'' => {
                    let mut literal = String::from('\'');
                    while let Some(ch) = chars.next() {
                        literal.push(ch);
                        if ch == '\'' {
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                literal.push('\'');
                            } else {
                                break;
                            }
                        }
                    }
                    code.push(MARK);
                    code.push_str(&literals.len().to_string());
                    code.push(MARK);
                    literals.push(literal);
                }
                '"' => {
                    while let Some(ch) = chars.next() {
                        if ch == '"' {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                code.push('"');
                            } else {
                                break;
                            }
                        } else {
                            code.extend(ch.to_lowercase());
                        }
                    }
                }
                other => code.extend(other.to_lowercase()),
            }
        }
        Self { code, literals }
    }

    /// Text of a literal without its quotes, given its placeholder.
    fn literal_text<'a>(&'a self, placeholder: &'a str) -> &'a str {
        placeholder
            .trim_matches(MARK)
            .parse::<usize>()
            .ok()
            .and_then(|i| self.literals.get(i))
            .map_or(placeholder, |lit| {
                lit.strip_prefix('\'')
                    .and_then(|l| l.strip_suffix('\''))
                    .unwrap_or(lit)
            })
    }

    /// Drops casts applied directly to literals. Literals cast to a numeric
    /// type lose their quotes along with the cast.
    fn strip_literal_casts(&self, code: &str) -> String {
        LITERAL_CAST
            .replace_all(code, |caps: &Captures| {
                let placeholder = &caps["lit"];
                let inner = self.literal_text(placeholder);
                if is_numeric_type(&caps["ty"]) && is_numeric_literal(inner) {
                    inner.to_string()
                } else {
                    placeholder.to_string()
                }
            })
            .into_owned()
    }

    /// Puts the literals back.
    fn restore(&self, code: &str) -> String {
        let mut out = String::with_capacity(code.len());
        let mut parts = code.split(MARK);
        if let Some(first) = parts.next() {
            out.push_str(first);
        }
        while let (Some(index), Some(after)) = (parts.next(), parts.next()) {
            match index.parse::<usize>().ok().and_then(|i| self.literals.get(i)) {
                Some(literal) => out.push_str(literal),
                None => out.push_str(index),
            }
            out.push_str(after);
        }
        out
    }
}

fn is_numeric_type(name: &str) -> bool {
    let base = name.find(['(', '[']).map_or(name, |end| &name[..end]);
    matches!(
        base,
        "smallint"
            | "integer"
            | "int"
            | "bigint"
            | "int2"
            | "int4"
            | "int8"
            | "numeric"
            | "decimal"
            | "real"
            | "float4"
            | "float8"
            | "double precision"
    )
}

fn is_numeric_literal(s: &str) -> bool {
    s.parse::<f64>().is_ok()
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
}

/// Position of `keyword` followed by a space or an opening paren.
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    text.match_indices(keyword)
        .map(|(pos, _)| pos)
        .find(|&pos| text[pos + keyword.len()..].starts_with([' ', '(']))
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_punctuation(code: &str) -> String {
    let code = OPEN_PAREN.replace_all(code, "(");
    let code = CLOSE_PAREN.replace_all(&code, ")");
    let code = COMMA.replace_all(&code, ", ");
    OPERATOR.replace_all(&code, "$1").trim().to_string()
}

/// Rewrites a reference to the owning table as `schema.name`.
fn normalize_table_reference(reference: &str, table: &TableName) -> String {
    let (schema, name) = match reference.rsplit_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, reference),
    };
    let owns = same_identifier(name, &table.name)
        && schema.map_or(true, |s| same_identifier(s, &table.schema));
    if owns {
        format!("{}.{}", lower(&table.schema), lower(&table.name))
    } else {
        reference.to_string()
    }
}

/// Removes `prefix` where it starts an identifier.
fn strip_qualifier(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(prefix) {
        let boundary = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '$' || c == '.'));
        out.push_str(&rest[..pos]);
        if !boundary {
            out.push_str(prefix);
        }
        rest = &rest[pos + prefix.len()..];
    }
    out.push_str(rest);
    out
}

/// `((col))` in a target list becomes `(col)`.
fn unwrap_columns(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = WRAPPED_COLUMN
            .replace_all(&current, "${lead}${col}")
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// `col::text` becomes `col`. Repeats until stable since adjacent matches
/// share the separator between them.
fn strip_column_casts(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = COLUMN_CAST
            .replace_all(&current, "${col}${after}")
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Strips parentheses that wrap the whole expression.
fn strip_outer_parens(expr: &str) -> &str {
    let mut expr = expr.trim();
    while expr.starts_with('(') && expr.ends_with(')') && closes_at_end(expr) {
        expr = expr[1..expr.len() - 1].trim();
    }
    expr
}

/// Returns `true` if the paren opened at byte 0 closes at the last byte.
fn closes_at_end(expr: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == expr.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}
