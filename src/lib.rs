pub mod analysis;
pub mod detect;
pub mod error;
pub mod gpx_types;
pub mod namespace;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod preview;
pub mod runkeeper_export;
pub mod services;
pub mod timestamp;
pub mod writer;
pub mod xml_tree;

use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use crate::options::{NormalizeOptions, PreviewOptions, RunkeeperOptions};

/// Parse and normalize a GPX string, returned as a JS object.
#[wasm_bindgen(js_name = inspectGpx)]
pub fn inspect_gpx(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts: NormalizeOptions = parse_options(options)?;
    let doc = pipeline::inspect(gpx_string, &opts)?;
    to_js(&doc)
}

/// Convert a GPX string into the canonical GPX document.
#[wasm_bindgen(js_name = normalizeGpx)]
pub fn normalize_gpx(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts: NormalizeOptions = parse_options(options)?;
    Ok(pipeline::normalize_str(gpx_string, &opts)?)
}

/// Convert a Yamareco GPX string for Runkeeper import.
#[wasm_bindgen(js_name = convertToRunkeeper)]
pub fn convert_to_runkeeper(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts: RunkeeperOptions = parse_options(options)?;
    Ok(runkeeper_export::convert_str(gpx_string, &opts)?)
}

/// Activity summary (dates, span, point counts) as a JS object.
#[wasm_bindgen(js_name = analyzeGpx)]
pub fn analyze_gpx(gpx_string: &str) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let doc = pipeline::inspect(gpx_string, &NormalizeOptions::default())?;
    to_js(&analysis::summarize(&doc))
}

/// GeoJSON map preview, returned as a JS object.
#[wasm_bindgen(js_name = previewGeoJson)]
pub fn preview_geojson(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts: PreviewOptions = parse_options(options)?;
    let doc = pipeline::inspect(gpx_string, &NormalizeOptions::default())?;
    let fc = preview::to_feature_collection(&doc, &opts);
    to_js(&fc)
}

/// GeoJSON map preview, returned as a JSON string.
#[wasm_bindgen(js_name = previewGeoJsonString)]
pub fn preview_geojson_string(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts: PreviewOptions = parse_options(options)?;
    let doc = pipeline::inspect(gpx_string, &NormalizeOptions::default())?;
    let fc = preview::to_feature_collection(&doc, &opts);
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options<T: DeserializeOwned + Default>(options: JsValue) -> Result<T, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(T::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
