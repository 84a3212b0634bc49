use crate::ddl::{self, ColumnDefinition};
use crate::error::Result;
use crate::ir::{EntitySpec, ForeignKeySpec, SchemaDocument};
use crate::types;

/// Render the model structs of one bundle as a Rust module.
pub fn generate_models(doc: &SchemaDocument, bundle: &str) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!(
        "// Models of the `{}` bundle, generated from its schema document.\n\n",
        bundle
    ));

    let Some(entities) = doc.bundles.get(bundle) else {
        return Ok(out);
    };
    for (entity_name, entity) in entities {
        let columns = ddl::resolve_columns(doc, bundle, entity)?;
        let links = links_into(doc, bundle, entity_name);
        out.push_str(&generate_model_struct(entity_name, entity, &columns, &links));
    }
    Ok(out)
}

/// Rows of a link entity that point at a model through one identifier
/// column and at another model through a second one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub bundle: String,
    pub entity: String,
    pub table: String,
    /// Column holding the identifier of the model the accessor is on
    pub column: String,
    /// The other identifier column, which names the accessor
    pub via: String,
}

/// Links from every link entity of the document into `bundle`.`entity_name`.
pub fn links_into(doc: &SchemaDocument, bundle: &str, entity_name: &str) -> Vec<Link> {
    let mut links = Vec::new();
    for (link_bundle, link_name, link_entity) in doc.entities() {
        let keys: Vec<(&str, &ForeignKeySpec)> = link_entity
            .columns
            .iter()
            .filter(|(_, c)| c.identifier)
            .filter_map(|(name, c)| c.index_of.as_ref().map(|fk| (name.as_str(), fk)))
            .collect();
        for (column, fk) in &keys {
            let Some((target_bundle, target, _)) = doc.find_entity(link_bundle, fk) else {
                continue;
            };
            if target_bundle != bundle || target != entity_name {
                continue;
            }
            for (via, other) in &keys {
                if other.model == fk.model {
                    continue;
                }
                links.push(Link {
                    bundle: link_bundle.to_string(),
                    entity: link_name.to_string(),
                    table: link_entity.table_name(link_name).to_string(),
                    column: column.to_string(),
                    via: via.to_string(),
                });
            }
        }
    }
    links
}

fn generate_model_struct(
    entity_name: &str,
    entity: &EntitySpec,
    columns: &[ColumnDefinition],
    links: &[Link],
) -> String {
    let struct_name = pascal_case(entity_name);
    let table = entity.table_name(entity_name);
    let mut out = String::new();

    out.push_str(&format!("/// Row of the `{}` table.\n", table));
    out.push_str("#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]\n");
    out.push_str(&format!("pub struct {} {{\n", struct_name));
    for column in columns {
        if column.name != escape_rust_keyword(&column.name) {
            out.push_str(&format!("    #[sqlx(rename = \"{}\")]\n", column.name));
        }
        out.push_str(&format!(
            "    pub {}: {},\n",
            escape_rust_keyword(&column.name),
            field_type(column)
        ));
    }
    out.push_str("}\n\n");

    let identifiers = entity
        .identifier_columns()
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("impl {} {{\n", struct_name));
    out.push_str(&format!("    pub const TABLE: &'static str = \"{}\";\n", table));
    out.push_str(&format!(
        "    pub const IDENTIFIER: &'static [&'static str] = &[{}];\n",
        identifiers
    ));
    for column in columns {
        out.push('\n');
        out.push_str(&getter(column));
        if !column.auto_increment {
            out.push('\n');
            out.push_str(&setter(column));
        }
    }
    if let Some(id) = entity.identifier_columns().first() {
        for link in links {
            out.push('\n');
            out.push_str(&link_accessor(link, id));
        }
    }
    out.push_str("}\n\n");
    out
}

fn setter(column: &ColumnDefinition) -> String {
    let field = escape_rust_keyword(&column.name);
    let name = column.name.trim_start_matches('_');
    format!(
        "    pub fn set_{}(&mut self, value: {}) {{\n        self.{} = value;\n    }}\n",
        name,
        field_type(column),
        field
    )
}

fn link_accessor(link: &Link, id: &str) -> String {
    let mut out = format!(
        "    /// `{}` rows linked to this one through `{}`.\n",
        link.table, link.column
    );
    out.push_str(&format!(
        "    pub async fn get_{}(&self, pool: &sqlx::MySqlPool) -> sqlx::Result<Vec<super::{}::{}>> {{\n",
        plural(link.via.trim_start_matches('_')),
        link.bundle,
        pascal_case(&link.entity)
    ));
    out.push_str(&format!(
        "        sqlx::query_as(\"SELECT * FROM `{}` WHERE `{}` = ?\")\n",
        link.table, link.column
    ));
    out.push_str(&format!("            .bind(&self.{})\n", escape_rust_keyword(id)));
    out.push_str("            .fetch_all(pool)\n            .await\n    }\n");
    out
}

fn plural(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    if name.ends_with(['s', 'x']) || name.ends_with("ch") || name.ends_with("sh") {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}

fn getter(column: &ColumnDefinition) -> String {
    let field = escape_rust_keyword(&column.name);
    let base = rust_type(&column.sql_type);
    let nullable = !column.not_null;
    let (ret, body) = match (base, nullable) {
        ("String", false) => ("&str".to_string(), format!("&self.{}", field)),
        ("String", true) => ("Option<&str>".to_string(), format!("self.{}.as_deref()", field)),
        (ty, false) => (ty.to_string(), format!("self.{}", field)),
        (ty, true) => (format!("Option<{}>", ty), format!("self.{}", field)),
    };
    let name = column.name.trim_start_matches('_');
    format!(
        "    pub fn get_{}(&self) -> {} {{\n        {}\n    }}\n",
        name, ret, body
    )
}

fn field_type(column: &ColumnDefinition) -> String {
    let ty = rust_type(&column.sql_type);
    if column.not_null {
        ty.to_string()
    } else {
        format!("Option<{}>", ty)
    }
}

/// Rust type used for a MySQL column type.
pub fn rust_type(sql_type: &str) -> &'static str {
    let parsed = types::abstract_type(sql_type);
    let base = sql_type
        .trim()
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match base.as_str() {
        "tinyint" if parsed.length == Some(1) => "bool",
        "bool" | "boolean" => "bool",
        "bigint" if parsed.unsigned => "u64",
        "bigint" => "i64",
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" if parsed.unsigned => "u32",
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" => "i32",
        "float" | "double" | "decimal" | "real" => "f64",
        _ => "String",
    }
}

pub fn pascal_case(s: &str) -> String {
    s.split('_')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut c = p.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_ascii_uppercase().to_string() + c.as_str(),
            }
        })
        .collect()
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use", "where", "while", "async", "await", "dyn", "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

fn escape_rust_keyword(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}
