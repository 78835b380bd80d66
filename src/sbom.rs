// src/sbom.rs

//! Software Bill of Materials (SBOM) export
//!
//! Converts a manifest into a CycloneDX 1.5 document: a flat component list
//! plus "depends-on" edges keyed by component reference.
//!
//! - Every non-aggregate module becomes an `application` component
//! - Every dependency becomes a `library` component, deduplicated by id and
//!   checksum
//! - Edges come from requested-by chains: the first element of each chain
//!   (the nearest parent) depends on the dependency
//!
//! Output is deterministic. Components, edges and each edge's children are
//! sorted by reference, and no timestamp or random serial number is emitted,
//! so exporting the same manifest twice yields identical bytes.

use crate::checksum::Checksum;
use crate::entities::{Dependency, Manifest};
use crate::error::{Error, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const SPEC_VERSION: &str = "1.5";
const XML_NAMESPACE: &str = "http://cyclonedx.org/schema/bom/1.5";

/// SBOM output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbomFormat {
    CycloneDxXml,
    CycloneDxJson,
}

impl SbomFormat {
    /// Command-line flag that selects the format
    pub const FLAG: &'static str = "--format";

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CycloneDxXml => "cyclonedx/xml",
            Self::CycloneDxJson => "cyclonedx/json",
        }
    }
}

impl fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SbomFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cyclonedx/xml" => Ok(Self::CycloneDxXml),
            "cyclonedx/json" => Ok(Self::CycloneDxJson),
            _ => Err(Error::UnsupportedFormat {
                value: s.to_string(),
                flag: Self::FLAG.to_string(),
            }),
        }
    }
}

/// Package coordinates parsed from a dependency or module id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageId {
    pub group: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

impl PackageId {
    /// Split an id on `:`
    ///
    /// `name`, `name:version` and `group:name:version` are accepted; any other
    /// segment count is an error.
    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split(':').collect();
        match parts.as_slice() {
            [name] => Ok(Self {
                group: None,
                name: name.to_string(),
                version: None,
            }),
            [name, version] => Ok(Self {
                group: None,
                name: name.to_string(),
                version: Some(version.to_string()),
            }),
            [group, name, version] => Ok(Self {
                group: Some(group.to_string()),
                name: name.to_string(),
                version: Some(version.to_string()),
            }),
            _ => Err(Error::InvalidPackageId {
                input: id.to_string(),
            }),
        }
    }
}

/// CycloneDX 1.5 document structures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bom {
    pub bom_format: String,
    pub spec_version: String,
    pub version: u32,
    pub metadata: Metadata,
    pub components: Vec<Component>,
    pub dependencies: Vec<DependencyEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Application,
    Library,
}

impl ComponentType {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Library => "library",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(rename = "bom-ref", skip_serializing_if = "Option::is_none")]
    pub bom_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Hash {
    pub alg: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    #[serde(rename = "ref")]
    pub reference: String,
    pub depends_on: Vec<String>,
}

fn hashes(checksum: &Checksum) -> Vec<Hash> {
    [
        ("SHA-1", &checksum.sha1),
        ("MD5", &checksum.md5),
        ("SHA-256", &checksum.sha256),
    ]
    .into_iter()
    .filter(|(_, digest)| !digest.is_empty())
    .map(|(alg, digest)| Hash {
        alg: alg.to_string(),
        content: digest.clone(),
    })
    .collect()
}

fn component(component_type: ComponentType, id: &str, checksum: &Checksum) -> Result<Component> {
    let package = PackageId::parse(id)?;
    Ok(Component {
        component_type,
        bom_ref: Some(id.to_string()),
        group: package.group,
        name: package.name,
        version: package.version,
        hashes: hashes(checksum),
    })
}

/// Build the CycloneDX document for a manifest
///
/// Every requested-by chain contributes an edge; the chain cap of exported
/// manifests does not apply here. A module that another module depends on is
/// emitted once, as an application component.
///
/// Fails on the first id that cannot be parsed; a BOM with malformed
/// references is never produced.
pub fn to_bom(manifest: &Manifest) -> Result<Bom> {
    let modules: Vec<_> = manifest
        .modules
        .iter()
        .filter(|m| {
            if m.is_aggregate() {
                debug!("Skipping aggregate module {}", m.id);
            }
            !m.is_aggregate()
        })
        .collect();

    let mut libraries: Vec<&Dependency> = Vec::new();
    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for module in &modules {
        for dep in &module.dependencies {
            if !libraries.iter().any(|d| d.same_identity(dep)) {
                libraries.push(dep);
            }
            for chain in &dep.requested_by {
                if let Some(parent) = chain.first() {
                    edges.entry(parent.clone()).or_default().insert(dep.id.clone());
                }
            }
        }
    }

    let mut components = Vec::new();
    for module in &modules {
        let checksum = if module.checksum.is_empty() {
            libraries
                .iter()
                .copied()
                .find(|d| d.id == module.id && !d.checksum.is_empty())
                .map_or(&module.checksum, |d| &d.checksum)
        } else {
            &module.checksum
        };
        components.push(component(ComponentType::Application, &module.id, checksum)?);
    }

    for dep in libraries {
        if modules.iter().any(|m| m.id == dep.id) {
            debug!("Dependency {} is a module of this build", dep.id);
            continue;
        }
        components.push(component(ComponentType::Library, &dep.id, &dep.checksum)?);
    }

    components.sort_by(|a, b| {
        a.bom_ref
            .cmp(&b.bom_ref)
            .then_with(|| a.component_type.cmp(&b.component_type))
            .then_with(|| a.hashes.cmp(&b.hashes))
    });

    let dependencies = edges
        .into_iter()
        .map(|(reference, children)| DependencyEdge {
            reference,
            depends_on: children.into_iter().collect(),
        })
        .collect();

    let metadata_component = if manifest.name.is_empty() {
        None
    } else {
        Some(Component {
            component_type: ComponentType::Application,
            bom_ref: None,
            group: None,
            name: manifest.name.clone(),
            version: (!manifest.number.is_empty()).then(|| manifest.number.clone()),
            hashes: Vec::new(),
        })
    };

    Ok(Bom {
        bom_format: "CycloneDX".to_string(),
        spec_version: SPEC_VERSION.to_string(),
        version: 1,
        metadata: Metadata {
            tools: vec![Tool {
                name: crate::entities::AGENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            }],
            component: metadata_component,
        },
        components,
        dependencies,
    })
}

/// Render a manifest in the requested SBOM format
pub fn render(manifest: &Manifest, format: SbomFormat) -> Result<String> {
    let bom = to_bom(manifest)?;
    match format {
        SbomFormat::CycloneDxJson => Ok(serde_json::to_string_pretty(&bom)?),
        SbomFormat::CycloneDxXml => to_xml(&bom),
    }
}

fn xml_error<E: fmt::Display>(e: E) -> Error {
    Error::Xml(e.to_string())
}

type XmlWriter = Writer<Vec<u8>>;

fn start(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let mut element = BytesStart::new(name);
    for attribute in attributes {
        element.push_attribute(*attribute);
    }
    writer.write_event(Event::Start(element)).map_err(xml_error)
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_error)
}

fn text_element(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)], text: &str) -> Result<()> {
    start(writer, name, attributes)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    end(writer, name)
}

fn write_component(writer: &mut XmlWriter, component: &Component) -> Result<()> {
    let mut attributes = vec![("type", component.component_type.as_str())];
    if let Some(ref bom_ref) = component.bom_ref {
        attributes.push(("bom-ref", bom_ref.as_str()));
    }
    start(writer, "component", &attributes)?;

    if let Some(ref group) = component.group {
        text_element(writer, "group", &[], group)?;
    }
    text_element(writer, "name", &[], &component.name)?;
    if let Some(ref version) = component.version {
        text_element(writer, "version", &[], version)?;
    }
    if !component.hashes.is_empty() {
        start(writer, "hashes", &[])?;
        for hash in &component.hashes {
            text_element(writer, "hash", &[("alg", hash.alg.as_str())], &hash.content)?;
        }
        end(writer, "hashes")?;
    }

    end(writer, "component")
}

/// Render a BOM as pretty-printed CycloneDX XML
pub fn to_xml(bom: &Bom) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let version = bom.version.to_string();
    start(&mut writer, "bom", &[("xmlns", XML_NAMESPACE), ("version", &version)])?;

    start(&mut writer, "metadata", &[])?;
    start(&mut writer, "tools", &[])?;
    for tool in &bom.metadata.tools {
        start(&mut writer, "tool", &[])?;
        text_element(&mut writer, "name", &[], &tool.name)?;
        text_element(&mut writer, "version", &[], &tool.version)?;
        end(&mut writer, "tool")?;
    }
    end(&mut writer, "tools")?;
    if let Some(ref component) = bom.metadata.component {
        write_component(&mut writer, component)?;
    }
    end(&mut writer, "metadata")?;

    start(&mut writer, "components", &[])?;
    for component in &bom.components {
        write_component(&mut writer, component)?;
    }
    end(&mut writer, "components")?;

    start(&mut writer, "dependencies", &[])?;
    for edge in &bom.dependencies {
        start(&mut writer, "dependency", &[("ref", edge.reference.as_str())])?;
        for child in &edge.depends_on {
            let mut element = BytesStart::new("dependency");
            element.push_attribute(("ref", child.as_str()));
            writer.write_event(Event::Empty(element)).map_err(xml_error)?;
        }
        end(&mut writer, "dependency")?;
    }
    end(&mut writer, "dependencies")?;

    end(&mut writer, "bom")?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}
