//! SDMX-ML data message reader.
//!
//! Reads structure-specific messages (`Series`/`Obs` with component values as
//! attributes) and tolerates the generic layout (`Value id= value=` children,
//! `ObsDimension`, `ObsValue`). Groups carry their key as attributes and their
//! own attribute values as `Comp id=".."` elements wrapping a `Value`.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{ClientError, Result};
use crate::service::{DataMessage, RawGroup, RawObservation, RawSeries};

/// Where the reader currently is in the document.
#[derive(Default)]
struct ParseState {
    series: Option<RawSeries>,
    observation: Option<RawObservation>,
    group: Option<RawGroup>,
    /// `id` of the open `Comp` element inside a group.
    comp_id: Option<String>,
    /// Inside a `Value` element whose text is still expected.
    awaiting_value_text: bool,
}

/// Reads a data message. `url` is only used for error reporting.
pub fn parse_data_message(url: &str, xml: &str) -> Result<DataMessage> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut message = DataMessage {
        url: url.to_string(),
        ..DataMessage::default()
    };
    let mut state = ParseState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => start_element(&e, &mut state, url)?,
            Ok(Event::Empty(e)) => {
                start_element(&e, &mut state, url)?;
                end_element(local_name(&e).as_str(), &mut state, &mut message);
            }
            Ok(Event::Text(e)) => {
                if state.awaiting_value_text {
                    let text = e.decode().map_err(|err| xml_error(url, &err))?;
                    record_comp_value(&mut state, text.trim());
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                end_element(&name, &mut state, &mut message);
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ClientError::Xml {
                    url: url.to_string(),
                    message: format!("at position {}: {err}", reader.error_position()),
                });
            }
            _ => {}
        }
    }

    Ok(message)
}

fn start_element(e: &BytesStart<'_>, state: &mut ParseState, url: &str) -> Result<()> {
    let name = local_name(e);
    match name.as_str() {
        "Series" => {
            state.series = Some(RawSeries {
                attributes: component_attributes(e, url)?,
                observations: Vec::new(),
            });
        }
        "Obs" if state.series.is_some() => {
            state.observation = Some(RawObservation {
                attributes: component_attributes(e, url)?,
            });
        }
        "Group" => {
            state.group = Some(RawGroup {
                key: component_attributes(e, url)?,
                attributes: BTreeMap::new(),
            });
        }
        "Comp" if state.group.is_some() => {
            state.comp_id = component_attributes(e, url)?.remove("id");
        }
        "Value" => {
            let mut attrs = component_attributes(e, url)?;
            if state.comp_id.is_some() {
                match attrs.remove("value") {
                    Some(value) => record_comp_value(state, &value),
                    None => state.awaiting_value_text = true,
                }
            } else if let (Some(id), Some(value)) = (attrs.remove("id"), attrs.remove("value")) {
                insert_component(state, id, value);
            }
        }
        "ObsDimension" => {
            if let Some(value) = component_attributes(e, url)?.remove("value") {
                insert_component(state, "TIME_PERIOD".to_string(), value);
            }
        }
        "ObsValue" => {
            if let Some(value) = component_attributes(e, url)?.remove("value") {
                insert_component(state, "OBS_VALUE".to_string(), value);
            }
        }
        _ => {}
    }
    Ok(())
}

fn end_element(name: &str, state: &mut ParseState, message: &mut DataMessage) {
    match name {
        "Obs" => {
            if let (Some(series), Some(obs)) = (state.series.as_mut(), state.observation.take()) {
                series.observations.push(obs);
            }
        }
        "Series" => {
            if let Some(series) = state.series.take() {
                message.series.push(series);
            }
        }
        "Group" => {
            if let Some(group) = state.group.take().filter(|g| !g.attributes.is_empty()) {
                message.groups.push(group);
            }
        }
        "Comp" => state.comp_id = None,
        "Value" => state.awaiting_value_text = false,
        _ => {}
    }
}

fn record_comp_value(state: &mut ParseState, value: &str) {
    state.awaiting_value_text = false;
    if value.is_empty() {
        return;
    }
    if let (Some(group), Some(id)) = (state.group.as_mut(), state.comp_id.as_ref()) {
        group.attributes.insert(id.clone(), value.to_string());
    }
}

/// Generic-layout component: goes to the innermost open observation, series or group.
fn insert_component(state: &mut ParseState, id: String, value: String) {
    if let Some(obs) = state.observation.as_mut() {
        obs.attributes.insert(id, value);
    } else if let Some(series) = state.series.as_mut() {
        series.attributes.insert(id, value);
    } else if let Some(group) = state.group.as_mut() {
        group.attributes.insert(id, value);
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Element attributes keyed by local name, without namespace declarations or `xsi:type`.
fn component_attributes(e: &BytesStart<'_>, url: &str) -> Result<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(url, &err))?;
        let key = attr.key;
        if key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let name = String::from_utf8_lossy(key.local_name().as_ref()).into_owned();
        if name == "type" {
            continue;
        }
        let value = attr.unescape_value().map_err(|err| xml_error(url, &err))?;
        attributes.insert(name, value.into_owned());
    }
    Ok(attributes)
}

fn xml_error(url: &str, err: &dyn std::fmt::Display) -> ClientError {
    ClientError::Xml {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRUCTURE_SPECIFIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<message:StructureSpecificData xmlns:message="http://www.sdmx.org/resources/sdmxml/schemas/v3_0/message"
    xmlns:ss="http://www.sdmx.org/resources/sdmxml/schemas/v3_0/data/structurespecific"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <message:DataSet ss:dataScope="DataStructure">
    <Group INDICATOR="CA" xsi:type="GROUP_INDICATOR">
      <Comp id="UNIT"><Value>USD</Value></Comp>
    </Group>
    <Series COUNTRY="BRA" INDICATOR="CA" FREQUENCY="A" SCALE="6">
      <Obs TIME_PERIOD="2023" OBS_VALUE="-28.5"/>
      <Obs TIME_PERIOD="2024" OBS_VALUE="-61.2" UNIT="EUR"/>
    </Series>
    <Series COUNTRY="ARG" INDICATOR="KA" FREQUENCY="A">
      <Obs TIME_PERIOD="2024"><ObsValue value="3.5"/></Obs>
    </Series>
  </message:DataSet>
</message:StructureSpecificData>"#;

    #[test]
    fn reads_series_observations_and_groups() {
        let message = parse_data_message("u", STRUCTURE_SPECIFIC).expect("parse xml");
        assert_eq!(message.series.len(), 2);
        assert_eq!(message.observation_count(), 3);

        let first = &message.series[0];
        assert_eq!(first.attributes["COUNTRY"], "BRA");
        assert_eq!(first.observations[1].attributes["UNIT"], "EUR");
        assert_eq!(message.series[1].observations[0].attributes["OBS_VALUE"], "3.5");

        assert_eq!(message.groups.len(), 1);
        assert_eq!(message.groups[0].key["INDICATOR"], "CA");
        assert_eq!(message.groups[0].attributes["UNIT"], "USD");
    }

    #[test]
    fn reads_generic_layout() {
        let xml = r#"<GenericData><DataSet>
            <Series>
              <SeriesKey><Value id="COUNTRY" value="BRA"/><Value id="INDICATOR" value="CA"/></SeriesKey>
              <Obs><ObsDimension value="2024-Q1"/><ObsValue value="1.25"/>
                <Attributes><Value id="OBS_STATUS" value="E"/></Attributes>
              </Obs>
            </Series>
        </DataSet></GenericData>"#;
        let message = parse_data_message("u", xml).expect("parse xml");
        let series = &message.series[0];
        assert_eq!(series.attributes["INDICATOR"], "CA");
        let obs = &series.observations[0].attributes;
        assert_eq!(obs["TIME_PERIOD"], "2024-Q1");
        assert_eq!(obs["OBS_VALUE"], "1.25");
        assert_eq!(obs["OBS_STATUS"], "E");
    }

    #[test]
    fn malformed_xml_is_an_error_with_url() {
        let err = parse_data_message("https://x/data", "<Series><Obs></Series>")
            .expect_err("mismatched tags");
        assert_eq!(err.url(), Some("https://x/data"));
    }
}
