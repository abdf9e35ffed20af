use std::{
    fmt,
    str::FromStr,
};

use errors::ErrorMetadata;

/// One level of a [`ResourceKey`]. Partitions may repeat to address
/// subpartitions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeySegment {
    Database(String),
    Schema(String),
    Table(String),
    Column(String),
    Partition(String),
    View(String),
    Procedure(String),
    Function(String),
}

impl KeySegment {
    fn kind(&self) -> &'static str {
        match self {
            KeySegment::Database(_) => "databases",
            KeySegment::Schema(_) => "schemas",
            KeySegment::Table(_) => "tables",
            KeySegment::Column(_) => "columns",
            KeySegment::Partition(_) => "partitions",
            KeySegment::View(_) => "views",
            KeySegment::Procedure(_) => "procedures",
            KeySegment::Function(_) => "functions",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            KeySegment::Database(name)
            | KeySegment::Schema(name)
            | KeySegment::Table(name)
            | KeySegment::Column(name)
            | KeySegment::Partition(name)
            | KeySegment::View(name)
            | KeySegment::Procedure(name)
            | KeySegment::Function(name) => name,
        }
    }

    fn from_kind(kind: &str, name: String) -> Option<Self> {
        let segment = match kind {
            "schemas" => KeySegment::Schema(name),
            "tables" => KeySegment::Table(name),
            "columns" => KeySegment::Column(name),
            "partitions" => KeySegment::Partition(name),
            "views" => KeySegment::View(name),
            "procedures" => KeySegment::Procedure(name),
            "functions" => KeySegment::Function(name),
            _ => return None,
        };
        Some(segment)
    }

    /// Whether `child` may directly follow `self` in a key.
    fn accepts_child(&self, child: &KeySegment) -> bool {
        matches!(
            (self, child),
            (KeySegment::Database(_), KeySegment::Schema(_))
                | (
                    KeySegment::Schema(_),
                    KeySegment::Table(_)
                        | KeySegment::View(_)
                        | KeySegment::Procedure(_)
                        | KeySegment::Function(_)
                )
                | (
                    KeySegment::Table(_),
                    KeySegment::Column(_) | KeySegment::Partition(_)
                )
                | (KeySegment::Partition(_), KeySegment::Partition(_))
        )
    }
}

/// Identifies a node of the schema tree by the names along its lineage.
///
/// Two keys built from the same names are equal regardless of which tree the
/// names came from, which is what lets the merge join source and target
/// objects. The string form is
/// `{database}/schemas/{schema}/tables/{table}/columns/{column}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    segments: Vec<KeySegment>,
}

/// The optional names used to address a resource. Absent names are skipped,
/// producing the key of the deepest ancestor that is named.
#[derive(Clone, Debug, Default)]
pub struct ResourceNames<'a> {
    pub schema: Option<&'a str>,
    pub table: Option<&'a str>,
    pub column: Option<&'a str>,
    pub partitions: Vec<&'a str>,
    pub view: Option<&'a str>,
    pub procedure: Option<&'a str>,
    pub function: Option<&'a str>,
}

impl ResourceKey {
    pub fn database(name: impl Into<String>) -> Self {
        Self {
            segments: vec![KeySegment::Database(name.into())],
        }
    }

    pub fn for_resource_name(database: &str, names: &ResourceNames<'_>) -> Self {
        let mut key = Self::database(database);
        if let Some(schema) = names.schema {
            key = key.schema(schema);
        }
        if let Some(table) = names.table {
            key = key.table(table);
            if let Some(column) = names.column {
                key = key.column(column);
            }
            for partition in &names.partitions {
                key = key.partition(*partition);
            }
        }
        if let Some(view) = names.view {
            key = key.view(view);
        }
        if let Some(procedure) = names.procedure {
            key = key.procedure(procedure);
        }
        if let Some(function) = names.function {
            key = key.function(function);
        }
        key
    }

    pub fn child(&self, segment: KeySegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self { segments }
    }

    pub fn schema(&self, name: impl Into<String>) -> Self {
        self.child(KeySegment::Schema(name.into()))
    }

    pub fn table(&self, name: impl Into<String>) -> Self {
        self.child(KeySegment::Table(name.into()))
    }

    pub fn column(&self, name: impl Into<String>) -> Self {
        self.child(KeySegment::Column(name.into()))
    }

    pub fn partition(&self, name: impl Into<String>) -> Self {
        self.child(KeySegment::Partition(name.into()))
    }

    pub fn view(&self, name: impl Into<String>) -> Self {
        self.child(KeySegment::View(name.into()))
    }

    pub fn procedure(&self, name: impl Into<String>) -> Self {
        self.child(KeySegment::Procedure(name.into()))
    }

    pub fn function(&self, name: impl Into<String>) -> Self {
        self.child(KeySegment::Function(name.into()))
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&KeySegment> {
        self.segments.last()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        (1..self.segments.len()).rev().map(|len| Self {
            segments: self.segments[..len].to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &ResourceKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn is_strict_ancestor_of(&self, other: &ResourceKey) -> bool {
        self.segments.len() < other.segments.len() && other.starts_with(self)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                KeySegment::Database(name) if i == 0 => write!(f, "{name}")?,
                _ => {
                    if i > 0 {
                        write!(f, "/")?;
                    }
                    write!(f, "{}/{}", segment.kind(), segment.name())?;
                },
            }
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResourceKeyParseError {
    #[error("Resource key {0:?} has a kind without a name")]
    MissingName(String),
    #[error("Resource key {key:?} has unknown segment kind {kind:?}")]
    UnknownKind { key: String, kind: String },
    #[error("Resource key {key:?} cannot have {child:?} directly under {parent:?}")]
    InvalidNesting {
        key: String,
        parent: String,
        child: String,
    },
}

impl FromStr for ResourceKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        parse_resource_key(s).map_err(|e| {
            let msg = e.to_string();
            anyhow::Error::new(e).context(ErrorMetadata::bad_request("InvalidResourceKey", msg))
        })
    }
}

fn parse_resource_key(s: &str) -> Result<ResourceKey, ResourceKeyParseError> {
    let mut parts = s.split('/');
    let database = parts.next().unwrap_or_default();
    let mut key = ResourceKey::database(database);
    while let Some(kind) = parts.next() {
        let Some(name) = parts.next() else {
            return Err(ResourceKeyParseError::MissingName(s.to_string()));
        };
        let segment = KeySegment::from_kind(kind, name.to_string()).ok_or_else(|| {
            ResourceKeyParseError::UnknownKind {
                key: s.to_string(),
                kind: kind.to_string(),
            }
        })?;
        if let Some(parent) = key.last() {
            if !parent.accepts_child(&segment) {
                return Err(ResourceKeyParseError::InvalidNesting {
                    key: s.to_string(),
                    parent: parent.kind().to_string(),
                    child: segment.kind().to_string(),
                });
            }
        }
        key = key.child(segment);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use errors::ErrorMetadataAnyhowExt;

    use super::{
        ResourceKey,
        ResourceNames,
    };

    #[test]
    fn test_for_resource_name_orders_segments() {
        let key = ResourceKey::for_resource_name(
            "employee",
            &ResourceNames {
                schema: Some("public"),
                table: Some("users"),
                column: Some("id"),
                ..Default::default()
            },
        );
        assert_eq!(key.to_string(), "employee/schemas/public/tables/users/columns/id");
        assert_eq!(
            key,
            ResourceKey::database("employee")
                .schema("public")
                .table("users")
                .column("id")
        );
    }

    #[test]
    fn test_absent_names_give_ancestor_key() {
        let key = ResourceKey::for_resource_name(
            "employee",
            &ResourceNames {
                schema: Some("public"),
                ..Default::default()
            },
        );
        assert_eq!(key.to_string(), "employee/schemas/public");
        assert!(key.is_strict_ancestor_of(&key.table("users")));
        assert!(!key.is_strict_ancestor_of(&key));
    }

    #[test]
    fn test_subpartition_path() {
        let key = ResourceKey::for_resource_name(
            "db",
            &ResourceNames {
                schema: Some(""),
                table: Some("t"),
                partitions: vec!["p0", "sp1"],
                ..Default::default()
            },
        );
        assert_eq!(key.to_string(), "db/schemas//tables/t/partitions/p0/partitions/sp1");
        assert_eq!(key.ancestors().count(), 4);
    }

    #[test]
    fn test_segment_comparison_has_no_separator_collision() {
        let a = ResourceKey::database("db").schema("a").table("b");
        let b = ResourceKey::database("db").schema("a/tables/b");
        assert_ne!(a, b);
        assert!(!ResourceKey::database("db").schema("pub").is_strict_ancestor_of(
            &ResourceKey::database("db").schema("public").table("t")
        ));
    }

    #[test]
    fn test_parse_round_trip() -> anyhow::Result<()> {
        let key = ResourceKey::database("employee")
            .schema("public")
            .view("active_users");
        assert_eq!(ResourceKey::from_str(&key.to_string())?, key);
        let empty_schema = ResourceKey::database("db").schema("").table("t");
        assert_eq!(ResourceKey::from_str("db/schemas//tables/t")?, empty_schema);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        for bad in [
            "db/schemas",
            "db/widgets/x",
            "db/tables/users",
            "db/schemas/public/columns/id",
        ] {
            let err = ResourceKey::from_str(bad).unwrap_err();
            assert!(err.is_bad_request(), "{bad}");
            assert_eq!(err.short_msg(), "InvalidResourceKey");
        }
    }
}
