//! WebAssembly bindings for the LTspice raw file decoder
//!
//! This crate provides WASM bindings for decoding LTspice `.raw` files
//! in browser and Node.js environments.
//!
//! # Usage
//!
//! ```javascript
//! import init, { parseLtspice } from 'ltspice-wasm';
//!
//! await init();
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const result = parseLtspice(bytes);
//! console.log(result.plotname, result.numPoints);
//! ```

use js_sys::{Array, Float64Array, Object, Reflect};
use ltspice_core::{self, Dataset, VectorData};
use serde::Serialize;
use tracing::debug;
use wasm_bindgen::prelude::*;

/// Header fields handed to JavaScript
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsMetadata {
    title: String,
    date: String,
    plotname: String,
    command: String,
    flags: String,
    offset: Option<f64>,
    num_points: usize,
    is_complex: bool,
    signal_names: Vec<String>,
    variables: Vec<JsVariable>,
    extra_fields: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsVariable {
    index: usize,
    name: String,
    kind: String,
    width: usize,
}

impl From<&Dataset> for JsMetadata {
    fn from(d: &Dataset) -> Self {
        let meta = &d.metadata;
        JsMetadata {
            title: meta.title.clone(),
            date: meta.date.clone(),
            plotname: meta.plotname.clone(),
            command: meta.command.clone(),
            flags: meta.flags.raw().to_string(),
            offset: meta.offset,
            num_points: meta.num_points,
            is_complex: meta.is_complex(),
            signal_names: meta.variable_names(),
            variables: meta
                .variables
                .iter()
                .map(|v| JsVariable {
                    index: v.index,
                    name: v.name.clone(),
                    kind: v.kind.clone(),
                    width: v.width.bytes(),
                })
                .collect(),
            extra_fields: meta
                .fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Parse an LTspice raw file from a Uint8Array
///
/// # Arguments
/// * `data` - Binary content of the `.raw` file
///
/// # Returns
/// A JavaScript object with the header fields, a `data` object mapping
/// each signal to a Float64Array, and for complex files a `complexData`
/// object holding `{ re, im }` pairs. Complex signals appear in `data` as
/// magnitudes.
#[wasm_bindgen(js_name = parseLtspice)]
pub fn parse_ltspice(data: &[u8]) -> Result<JsValue, JsValue> {
    let dataset =
        ltspice_core::read_bytes(data).map_err(|e| JsValue::from_str(&e.to_string()))?;
    debug!(
        points = dataset.len(),
        signals = dataset.vectors.len(),
        "Raw file decoded"
    );
    create_js_result(&dataset)
}

fn create_js_result(dataset: &Dataset) -> Result<JsValue, JsValue> {
    let result = serde_wasm_bindgen::to_value(&JsMetadata::from(dataset))?;

    let data_obj = Object::new();
    let complex_obj = Object::new();
    for (var, vector) in dataset.iter() {
        let name: JsValue = var.name.as_str().into();
        match vector {
            VectorData::Real(values) => {
                Reflect::set(&data_obj, &name, &Float64Array::from(values.as_slice()))?;
            }
            VectorData::Complex(values) => {
                let magnitude = vector.magnitude();
                Reflect::set(&data_obj, &name, &Float64Array::from(magnitude.as_slice()))?;

                let re: Vec<f64> = values.iter().map(|c| c.re).collect();
                let im: Vec<f64> = values.iter().map(|c| c.im).collect();
                let pair = Object::new();
                Reflect::set(&pair, &"re".into(), &Float64Array::from(re.as_slice()))?;
                Reflect::set(&pair, &"im".into(), &Float64Array::from(im.as_slice()))?;
                Reflect::set(&complex_obj, &name, &pair)?;
            }
        }
    }
    Reflect::set(&result, &"data".into(), &data_obj)?;
    if dataset.metadata.is_complex() {
        Reflect::set(&result, &"complexData".into(), &complex_obj)?;
    }

    Ok(result)
}

/// Get signal data from a parsed result
#[wasm_bindgen(js_name = getSignalData)]
pub fn get_signal_data(result: &JsValue, signal_name: &str) -> Result<Float64Array, JsValue> {
    let data = Reflect::get(result, &"data".into())?;
    let signal = Reflect::get(&data, &signal_name.into())?;

    if signal.is_undefined() {
        return Err(JsValue::from_str(&format!(
            "Signal '{}' not found",
            signal_name
        )));
    }

    Ok(Float64Array::from(signal))
}

/// Get all signal names, in declared order
#[wasm_bindgen(js_name = getSignalNames)]
pub fn get_signal_names(result: &JsValue) -> Result<Array, JsValue> {
    let names = Reflect::get(result, &"signalNames".into())?;

    Ok(Array::from(&names))
}
