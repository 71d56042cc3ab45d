//! OpenStreetMap XML reader
//!
//! Streams an `.osm` export through quick-xml and keeps the two element
//! kinds the simulation needs:
//! - `<node>`: coordinate plus tags
//! - `<way>`: ordered node references plus tags
//!
//! Relations are recognised and dropped. Any element outside the OSM schema
//! is reported as an error rather than silently skipped, since it usually
//! means the input is not an OSM export at all.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::OsmError;
use crate::geo::Coord;

/// Identity of an OSM element (negative for unsaved edits)
pub type OsmId = i64;

/// Tag dictionary, same keys and values as in the XML file
pub type Tags = BTreeMap<String, String>;

/// A `<node>` of the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub coord: Coord,
    pub tags: Tags,
}

impl Node {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            coord: Coord::new(lat, lon),
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// A `<way>` of the export
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Way {
    /// Node references, in drawing order
    pub nodes: Vec<OsmId>,
    pub tags: Tags,
}

impl Way {
    pub fn new(nodes: Vec<OsmId>) -> Self {
        Self {
            nodes,
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether the way ends where it starts (building outlines, roundabouts)
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first() == self.nodes.last()
    }
}

/// Raw GIS data of an export, keyed by element id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOsm {
    pub nodes: BTreeMap<OsmId, Node>,
    pub ways: BTreeMap<OsmId, Way>,
}

impl RawOsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, id: OsmId, node: Node) {
        self.nodes.insert(id, node);
    }

    pub fn insert_way(&mut self, id: OsmId, way: Way) {
        self.ways.insert(id, way);
    }

    pub fn node(&self, id: OsmId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn way(&self, id: OsmId) -> Option<&Way> {
        self.ways.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }
}

/// Reads the OSM XML file with the given name
pub fn read_osm<P: AsRef<Path>>(path: P) -> Result<RawOsm, OsmError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| OsmError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_osm_reader(BufReader::new(file), &path.display().to_string())
}

/// Parses OSM XML held in memory
pub fn parse_osm_str(xml: &str) -> Result<RawOsm, OsmError> {
    parse_osm_reader(xml.as_bytes(), "<memory>")
}

/// Parses OSM XML from any buffered reader
///
/// `source_name` only appears in error messages.
pub fn parse_osm_reader<R: BufRead>(input: R, source_name: &str) -> Result<RawOsm, OsmError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut builder = RawOsmBuilder::default();
    let mut buf = Vec::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(source) => {
                return Err(OsmError::Xml {
                    source_name: source_name.to_string(),
                    position: reader.buffer_position() as u64,
                    source,
                })
            }
        };
        let position = reader.buffer_position() as u64;

        match event {
            Event::Start(e) => builder.start(&e, source_name, position)?,
            Event::Empty(e) => {
                builder.start(&e, source_name, position)?;
                builder.end(e.name().as_ref())?;
            }
            Event::End(e) => builder.end(e.name().as_ref())?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    builder.finish()
}

/// Element currently open on the parser stack
enum Pending {
    Node(OsmId, Node),
    Way(OsmId, Way),
    Relation,
}

#[derive(Default)]
struct RawOsmBuilder {
    raw: RawOsm,
    stack: Vec<Pending>,
    relations: usize,
}

impl RawOsmBuilder {
    fn start(&mut self, e: &BytesStart, source_name: &str, position: u64) -> Result<(), OsmError> {
        let attrs = Attrs::collect(e, source_name, position)?;

        match e.name().as_ref() {
            b"osm" | b"bounds" | b"note" | b"meta" | b"member" => {}
            b"node" => {
                let id = attrs.parse::<OsmId>("node", "id")?;
                let lat = attrs.parse::<f64>("node", "lat")?;
                let lon = attrs.parse::<f64>("node", "lon")?;
                let node = Node::new(lat, lon);
                if !node.coord.is_valid() {
                    return Err(OsmError::InvalidAttribute {
                        element: "node".to_string(),
                        attribute: "lat/lon".to_string(),
                        value: format!("{},{}", lat, lon),
                    });
                }
                self.stack.push(Pending::Node(id, node));
            }
            b"way" => {
                let id = attrs.parse::<OsmId>("way", "id")?;
                self.stack.push(Pending::Way(id, Way::default()));
            }
            b"relation" => self.stack.push(Pending::Relation),
            b"nd" => {
                if let Some(Pending::Way(_, way)) = self.stack.last_mut() {
                    way.nodes.push(attrs.parse::<OsmId>("nd", "ref")?);
                }
            }
            b"tag" => match self.stack.last_mut() {
                Some(Pending::Node(_, node)) => {
                    node.tags
                        .insert(attrs.required("tag", "k")?, attrs.required("tag", "v")?);
                }
                Some(Pending::Way(_, way)) => {
                    way.tags
                        .insert(attrs.required("tag", "k")?, attrs.required("tag", "v")?);
                }
                _ => {}
            },
            other => {
                return Err(OsmError::UnrecognizedElement(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<(), OsmError> {
        match name {
            b"osm" | b"bounds" | b"note" | b"meta" | b"member" | b"nd" | b"tag" => Ok(()),
            b"node" => match self.stack.pop() {
                Some(Pending::Node(id, node)) => {
                    self.raw.nodes.insert(id, node);
                    Ok(())
                }
                _ => Err(OsmError::Unbalanced("node".to_string())),
            },
            b"way" => match self.stack.pop() {
                Some(Pending::Way(id, way)) => {
                    self.raw.ways.insert(id, way);
                    Ok(())
                }
                _ => Err(OsmError::Unbalanced("way".to_string())),
            },
            b"relation" => match self.stack.pop() {
                Some(Pending::Relation) => {
                    self.relations += 1;
                    Ok(())
                }
                _ => Err(OsmError::Unbalanced("relation".to_string())),
            },
            other => Err(OsmError::UnrecognizedElement(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    fn finish(self) -> Result<RawOsm, OsmError> {
        if let Some(open) = self.stack.last() {
            let name = match open {
                Pending::Node(..) => "node",
                Pending::Way(..) => "way",
                Pending::Relation => "relation",
            };
            return Err(OsmError::Unbalanced(name.to_string()));
        }
        if self.relations > 0 {
            debug!(relations = self.relations, "Skipped OSM relations");
        }
        info!(
            nodes = self.raw.node_count(),
            ways = self.raw.way_count(),
            "Parsed OSM data"
        );
        Ok(self.raw)
    }
}

/// Unescaped attributes of one element
struct Attrs(Vec<(Vec<u8>, String)>);

impl Attrs {
    fn collect(e: &BytesStart, source_name: &str, position: u64) -> Result<Self, OsmError> {
        let xml_err = |source: quick_xml::Error| OsmError::Xml {
            source_name: source_name.to_string(),
            position,
            source,
        };

        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| xml_err(err.into()))?;
            let value = attr.unescape_value().map_err(xml_err)?;
            attrs.push((attr.key.as_ref().to_vec(), value.into_owned()));
        }
        Ok(Self(attrs))
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.as_slice() == name.as_bytes())
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, element: &str, name: &str) -> Result<String, OsmError> {
        self.get(name)
            .map(str::to_string)
            .ok_or_else(|| OsmError::MissingAttribute {
                element: element.to_string(),
                attribute: name.to_string(),
            })
    }

    fn parse<T: FromStr>(&self, element: &str, name: &str) -> Result<T, OsmError> {
        let raw = self.get(name).ok_or_else(|| OsmError::MissingAttribute {
            element: element.to_string(),
            attribute: name.to_string(),
        })?;
        raw.trim().parse::<T>().map_err(|_| OsmError::InvalidAttribute {
            element: element.to_string(),
            attribute: name.to_string(),
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{small_town, SMALL_TOWN_OSM};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_fixture_counts() {
        let raw = small_town();
        // 9 grid junctions, 1 mid-block node, 2 farm nodes, 7 POI nodes,
        // 4 apartment corners, 1 stray node
        assert_eq!(raw.node_count(), 24);
        // 7 roads + 1 building
        assert_eq!(raw.way_count(), 8);
    }

    #[test]
    fn test_tags_and_refs() {
        let raw = small_town();

        let signals = raw.node(5).unwrap();
        assert_eq!(signals.tag("highway"), Some("traffic_signals"));
        assert!((signals.coord.lat - 51.505).abs() < 1e-9);
        assert!((signals.coord.lon + 0.095).abs() < 1e-9);

        let high_street = raw.way(1001).unwrap();
        assert_eq!(high_street.nodes, vec![1, 101, 2, 3]);
        assert_eq!(high_street.tag("name"), Some("High Street"));
        assert_eq!(high_street.tag("highway"), Some("primary"));

        let apartments = raw.way(2001).unwrap();
        assert!(apartments.is_closed());
    }

    #[test]
    fn test_relations_are_dropped() {
        let raw = small_town();
        // the relation's tag must not leak onto any node or way
        assert!(raw.ways.values().all(|w| w.tag("route") != Some("bus")));
        assert!(raw.nodes.values().all(|n| n.tag("route") != Some("bus")));
    }

    #[test]
    fn test_escaped_values_are_unescaped() {
        let raw = parse_osm_str(
            r#"<osm><node id="1" lat="1.0" lon="2.0"><tag k="name" v="Fish &amp; Chips"/></node></osm>"#,
        )
        .unwrap();
        assert_eq!(raw.node(1).unwrap().tag("name"), Some("Fish & Chips"));
    }

    #[test]
    fn test_unknown_element_rejected() {
        let err = parse_osm_str(r#"<osm><building id="1"/></osm>"#).unwrap_err();
        assert!(matches!(err, OsmError::UnrecognizedElement(ref name) if name == "building"));
    }

    #[test]
    fn test_missing_attribute_rejected() {
        let err = parse_osm_str(r#"<osm><node id="1" lat="1.0"/></osm>"#).unwrap_err();
        assert!(matches!(
            err,
            OsmError::MissingAttribute { ref attribute, .. } if attribute == "lon"
        ));
    }

    #[test]
    fn test_invalid_coordinate_rejected() {
        let err = parse_osm_str(r#"<osm><node id="1" lat="abc" lon="1.0"/></osm>"#).unwrap_err();
        assert!(matches!(err, OsmError::InvalidAttribute { .. }));

        let err = parse_osm_str(r#"<osm><node id="1" lat="95.0" lon="1.0"/></osm>"#).unwrap_err();
        assert!(matches!(err, OsmError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let err = parse_osm_str(r#"<osm><node id="1" lat="1.0" lon="2.0"></way></osm>"#)
            .unwrap_err();
        assert!(matches!(err, OsmError::Xml { .. } | OsmError::Unbalanced(_)));
    }

    #[test]
    fn test_nd_outside_way_is_ignored() {
        let raw = parse_osm_str(
            r#"<osm><node id="1" lat="1.0" lon="2.0"><nd ref="7"/></node></osm>"#,
        )
        .unwrap();
        assert_eq!(raw.node_count(), 1);
    }

    #[test]
    fn test_read_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SMALL_TOWN_OSM.as_bytes()).unwrap();
        let raw = read_osm(file.path()).unwrap();
        assert_eq!(raw, small_town());
    }

    #[test]
    fn test_missing_file() {
        let err = read_osm("/definitely/not/here.osm").unwrap_err();
        assert!(matches!(err, OsmError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.osm"));
    }
}
