//! Schema types describing provider and resource structure.
//!
//! A provider reports its schema once, at connection time. Every later
//! encode and decode of a dynamic value is checked against the implied type
//! of one of these blocks, so the loaded [`Schema`] is immutable and shared.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Type;

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider (read-only).
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional+computed attribute.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Describes a single attribute in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The value type of the attribute.
    #[serde(rename = "type")]
    pub ty: Type,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The provider has marked this attribute as deprecated.
    #[serde(default)]
    pub deprecated: bool,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(ty: Type, flags: AttributeFlags) -> Self {
        Self {
            ty,
            flags,
            description: None,
            deprecated: false,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(Type::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(Type::String, AttributeFlags::optional())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(Type::String, AttributeFlags::computed())
    }

    /// Create a required number attribute.
    pub fn required_number() -> Self {
        Self::new(Type::Number, AttributeFlags::required())
    }

    /// Create an optional number attribute.
    pub fn optional_number() -> Self {
        Self::new(Type::Number, AttributeFlags::optional())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(Type::Bool, AttributeFlags::optional())
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as deprecated.
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How a nested block appears within its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NestingMode {
    /// The provider sent a nesting mode this client does not recognize.
    #[default]
    Invalid,
    /// At most one nested block; absent means null.
    Single,
    /// Exactly one nested block; absent means all attributes null.
    Group,
    /// A list of nested blocks (zero or more, ordered).
    List,
    /// A set of nested blocks (zero or more, unordered, unique).
    Set,
    /// A map of nested blocks keyed by string.
    Map,
}

/// A set of attributes and nested blocks.
///
/// Attribute and nested block names are disjoint within one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The attributes within this block.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    /// Nested block types within this block.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    /// Human-readable description of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The provider has marked this block as deprecated.
    #[serde(default)]
    pub deprecated: bool,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to this block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The object type values of this block must conform to.
    pub fn implied_type(&self) -> Type {
        let attributes = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.ty.clone()));
        let blocks = self
            .blocks
            .iter()
            .map(|(name, nested)| (name.clone(), nested.implied_type()));
        Type::object(attributes.chain(blocks))
    }
}

/// A nested block type with its nesting mode and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block is nested.
    #[serde(default)]
    pub nesting: NestingMode,
    /// Minimum number of blocks required.
    #[serde(default)]
    pub min_items: u64,
    /// Maximum number of blocks allowed (0 = unlimited).
    #[serde(default)]
    pub max_items: u64,
}

impl NestedBlock {
    /// Create a nested block with the given nesting mode and no item limits.
    pub fn new(block: Block, nesting: NestingMode) -> Self {
        Self {
            block,
            nesting,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Create a single nested block (0 or 1 allowed).
    pub fn single(block: Block) -> Self {
        Self::new(block, NestingMode::Single).with_max_items(1)
    }

    /// Create a group nested block.
    pub fn group(block: Block) -> Self {
        Self::new(block, NestingMode::Group)
    }

    /// Create a list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self::new(block, NestingMode::List)
    }

    /// Create a set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self::new(block, NestingMode::Set)
    }

    /// Create a map of nested blocks.
    pub fn map(block: Block) -> Self {
        Self::new(block, NestingMode::Map)
    }

    /// Set the minimum number of blocks required.
    pub fn with_min_items(mut self, min: u64) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks allowed.
    pub fn with_max_items(mut self, max: u64) -> Self {
        self.max_items = max;
        self
    }

    /// The type this nested block contributes to its parent's object type.
    pub fn implied_type(&self) -> Type {
        let object = self.block.implied_type();
        match self.nesting {
            NestingMode::Single | NestingMode::Group => object,
            // Elements of a list or map may each have a different concrete
            // type when the object contains dynamic attributes.
            NestingMode::List if object.has_dynamic_types() => Type::Dynamic,
            NestingMode::List => Type::list(object),
            NestingMode::Set => Type::set(object),
            NestingMode::Map if object.has_dynamic_types() => Type::Dynamic,
            NestingMode::Map => Type::map(object),
            NestingMode::Invalid => Type::Dynamic,
        }
    }
}

/// Schema of one managed resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ManagedResourceTypeSchema {
    /// Version of the resource's state layout, used for state upgrades.
    #[serde(default)]
    pub version: i64,
    /// The root block of the resource.
    #[serde(flatten)]
    pub content: Block,
}

impl ManagedResourceTypeSchema {
    /// Create a schema at the given version.
    pub fn new(version: i64, content: Block) -> Self {
        Self { version, content }
    }
}

/// Schema of one data resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataResourceTypeSchema {
    /// The root block of the data source.
    #[serde(flatten)]
    pub content: Block,
}

impl DataResourceTypeSchema {
    /// Create a data resource schema.
    pub fn new(content: Block) -> Self {
        Self { content }
    }
}

/// The complete schema reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Schema of the provider's own configuration.
    #[serde(default)]
    pub provider_config: Block,
    /// Schema of the per-module provider meta block, if the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<Block>,
    /// Schemas for each managed resource type.
    #[serde(default)]
    pub managed_resource_types: HashMap<String, Arc<ManagedResourceTypeSchema>>,
    /// Schemas for each data resource type.
    #[serde(default)]
    pub data_resource_types: HashMap<String, Arc<DataResourceTypeSchema>>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration block.
    pub fn with_provider_config(mut self, block: Block) -> Self {
        self.provider_config = block;
        self
    }

    /// Set the provider meta block.
    pub fn with_provider_meta(mut self, block: Block) -> Self {
        self.provider_meta = Some(block);
        self
    }

    /// Add a managed resource type.
    pub fn with_managed_resource_type(
        mut self,
        name: impl Into<String>,
        schema: ManagedResourceTypeSchema,
    ) -> Self {
        self.managed_resource_types
            .insert(name.into(), Arc::new(schema));
        self
    }

    /// Add a data resource type.
    pub fn with_data_resource_type(
        mut self,
        name: impl Into<String>,
        schema: DataResourceTypeSchema,
    ) -> Self {
        self.data_resource_types.insert(name.into(), Arc::new(schema));
        self
    }

    /// Look up a managed resource type by name.
    pub fn managed_resource_type(&self, name: &str) -> Option<&Arc<ManagedResourceTypeSchema>> {
        self.managed_resource_types.get(name)
    }

    /// Look up a data resource type by name.
    pub fn data_resource_type(&self, name: &str) -> Option<&Arc<DataResourceTypeSchema>> {
        self.data_resource_types.get(name)
    }
}
