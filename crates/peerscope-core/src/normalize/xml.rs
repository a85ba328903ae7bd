// XML to JSON conversion for vendor responses.
//
// Elements become objects, attributes become `@name` keys, text becomes the
// element value (or `_text` when attributes exist), repeated siblings become
// arrays, and empty elements become `null`.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

fn attributes(start: &BytesStart<'_>) -> Map<String, Value> {
    let mut obj = Map::new();
    for attr in start.attributes().flatten() {
        let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        obj.insert(key, Value::String(value));
    }
    obj
}

fn attach(parent: &mut Value, name: String, value: Value) {
    let Value::Object(obj) = parent else { return };
    match obj.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let prev = existing.take();
            *existing = Value::Array(vec![prev, value]);
        }
        None => {
            obj.insert(name, value);
        }
    }
}

/// Convert an XML document into a JSON object keyed by its root element(s).
pub fn to_json(xml: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<(String, Value)> = vec![(String::new(), Value::Object(Map::new()))];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push((name, Value::Object(attributes(&e))));
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err("unbalanced closing tag".into());
                }
                if let Some((name, value)) = stack.pop() {
                    if let Some((_, parent)) = stack.last_mut() {
                        attach(parent, name, value);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let obj = attributes(&e);
                let value = if obj.is_empty() {
                    Value::Null
                } else {
                    Value::Object(obj)
                };
                if let Some((_, parent)) = stack.last_mut() {
                    attach(parent, name, value);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| format!("XML unescape error: {e}"))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some((_, current)) = stack.last_mut() {
                    match current {
                        Value::Object(obj) if obj.is_empty() => {
                            *current = Value::String(text.to_owned());
                        }
                        Value::Object(obj) => {
                            obj.insert("_text".into(), Value::String(text.to_owned()));
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err("unterminated element".into());
    }
    stack
        .pop()
        .map(|(_, root)| root)
        .ok_or_else(|| "empty document".into())
}
