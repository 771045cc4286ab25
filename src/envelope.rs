//! Open inference protocol (V2 dataplane) envelopes carried on pipeline topics.
//!
//! Requests travel on `inputs` topics and responses on `outputs` topics.
//! Tensor payloads may arrive packed in `raw_*_contents`; [`normalize_request`]
//! and [`normalize_response`] unpack them into typed [`InferTensorContents`].

use std::collections::HashMap;

use prost::Message;
use serde::Serialize;

use crate::error::DecodeError;
use crate::topic::Direction;

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct ModelInferRequest {
    #[prost(string, tag = "1")]
    pub model_name: String,
    #[prost(string, tag = "2")]
    pub model_version: String,
    #[prost(string, tag = "3")]
    pub id: String,
    #[prost(map = "string, message", tag = "4")]
    pub parameters: HashMap<String, InferParameter>,
    #[prost(message, repeated, tag = "5")]
    pub inputs: Vec<InferInputTensor>,
    #[prost(message, repeated, tag = "6")]
    pub outputs: Vec<InferRequestedOutputTensor>,
    #[prost(bytes = "vec", repeated, tag = "7")]
    pub raw_input_contents: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct ModelInferResponse {
    #[prost(string, tag = "1")]
    pub model_name: String,
    #[prost(string, tag = "2")]
    pub model_version: String,
    #[prost(string, tag = "3")]
    pub id: String,
    #[prost(map = "string, message", tag = "4")]
    pub parameters: HashMap<String, InferParameter>,
    #[prost(message, repeated, tag = "5")]
    pub outputs: Vec<InferOutputTensor>,
    #[prost(bytes = "vec", repeated, tag = "6")]
    pub raw_output_contents: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct InferInputTensor {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub datatype: String,
    #[prost(int64, repeated, tag = "3")]
    pub shape: Vec<i64>,
    #[prost(map = "string, message", tag = "4")]
    pub parameters: HashMap<String, InferParameter>,
    #[prost(message, optional, tag = "5")]
    pub contents: Option<InferTensorContents>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct InferRequestedOutputTensor {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(map = "string, message", tag = "2")]
    pub parameters: HashMap<String, InferParameter>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct InferOutputTensor {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub datatype: String,
    #[prost(int64, repeated, tag = "3")]
    pub shape: Vec<i64>,
    #[prost(map = "string, message", tag = "4")]
    pub parameters: HashMap<String, InferParameter>,
    #[prost(message, optional, tag = "5")]
    pub contents: Option<InferTensorContents>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct InferParameter {
    #[prost(oneof = "ParameterChoice", tags = "1, 2, 3")]
    pub parameter_choice: Option<ParameterChoice>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Oneof)]
#[serde(rename_all = "snake_case")]
pub enum ParameterChoice {
    #[prost(bool, tag = "1")]
    BoolParam(bool),
    #[prost(int64, tag = "2")]
    Int64Param(i64),
    #[prost(string, tag = "3")]
    StringParam(String),
}

/// Typed tensor contents. Exactly one field is populated, chosen by datatype.
#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct InferTensorContents {
    #[prost(bool, repeated, tag = "1")]
    pub bool_contents: Vec<bool>,
    #[prost(int32, repeated, tag = "2")]
    pub int_contents: Vec<i32>,
    #[prost(int64, repeated, tag = "3")]
    pub int64_contents: Vec<i64>,
    #[prost(uint32, repeated, tag = "4")]
    pub uint_contents: Vec<u32>,
    #[prost(uint64, repeated, tag = "5")]
    pub uint64_contents: Vec<u64>,
    #[prost(float, repeated, tag = "6")]
    pub fp32_contents: Vec<f32>,
    #[prost(double, repeated, tag = "7")]
    pub fp64_contents: Vec<f64>,
    #[prost(bytes = "vec", repeated, tag = "8")]
    pub bytes_contents: Vec<Vec<u8>>,
}

/// A decoded message from a pipeline topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    Request(ModelInferRequest),
    Response(ModelInferResponse),
}

/// Decodes raw message bytes into a normalized envelope.
pub trait EnvelopeDecoder: Send + Sync {
    /// `direction` picks the envelope type: inputs carry requests, outputs
    /// carry responses.
    fn decode(&self, payload: &[u8], direction: Direction) -> Result<Envelope, DecodeError>;
}

/// Protobuf decoder that also unpacks raw tensor contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufDecoder;

impl EnvelopeDecoder for ProtobufDecoder {
    fn decode(&self, payload: &[u8], direction: Direction) -> Result<Envelope, DecodeError> {
        match direction {
            Direction::Inputs => {
                let mut req = ModelInferRequest::decode(payload)?;
                normalize_request(&mut req)?;
                Ok(Envelope::Request(req))
            }
            Direction::Outputs => {
                let mut res = ModelInferResponse::decode(payload)?;
                normalize_response(&mut res)?;
                Ok(Envelope::Response(res))
            }
        }
    }
}

/// Move `raw_input_contents` into each input's typed `contents`.
pub fn normalize_request(req: &mut ModelInferRequest) -> Result<(), DecodeError> {
    if req.raw_input_contents.is_empty() {
        return Ok(());
    }
    if req.raw_input_contents.len() != req.inputs.len() {
        return Err(DecodeError::RawContentsMismatch {
            raw: req.raw_input_contents.len(),
            tensors: req.inputs.len(),
        });
    }
    let raw = std::mem::take(&mut req.raw_input_contents);
    for (input, bytes) in req.inputs.iter_mut().zip(raw) {
        input.contents = Some(unpack_contents(&input.name, &input.datatype, &bytes)?);
    }
    Ok(())
}

/// Move `raw_output_contents` into each output's typed `contents`.
pub fn normalize_response(res: &mut ModelInferResponse) -> Result<(), DecodeError> {
    if res.raw_output_contents.is_empty() {
        return Ok(());
    }
    if res.raw_output_contents.len() != res.outputs.len() {
        return Err(DecodeError::RawContentsMismatch {
            raw: res.raw_output_contents.len(),
            tensors: res.outputs.len(),
        });
    }
    let raw = std::mem::take(&mut res.raw_output_contents);
    for (output, bytes) in res.outputs.iter_mut().zip(raw) {
        output.contents = Some(unpack_contents(&output.name, &output.datatype, &bytes)?);
    }
    Ok(())
}

/// Decode little-endian packed values according to `datatype`.
fn unpack_contents(
    tensor: &str,
    datatype: &str,
    raw: &[u8],
) -> Result<InferTensorContents, DecodeError> {
    let mut contents = InferTensorContents::default();
    match datatype {
        "BOOL" => contents.bool_contents = raw.iter().map(|b| *b != 0).collect(),
        "UINT8" => contents.uint_contents = raw.iter().map(|b| u32::from(*b)).collect(),
        "UINT16" => {
            contents.uint_contents = fixed::<2, _>(tensor, raw, |b| u16::from_le_bytes(b).into())?
        }
        "UINT32" => contents.uint_contents = fixed::<4, _>(tensor, raw, u32::from_le_bytes)?,
        "UINT64" => contents.uint64_contents = fixed::<8, _>(tensor, raw, u64::from_le_bytes)?,
        "INT8" => contents.int_contents = raw.iter().map(|b| i32::from(*b as i8)).collect(),
        "INT16" => {
            contents.int_contents = fixed::<2, _>(tensor, raw, |b| i16::from_le_bytes(b).into())?
        }
        "INT32" => contents.int_contents = fixed::<4, _>(tensor, raw, i32::from_le_bytes)?,
        "INT64" => contents.int64_contents = fixed::<8, _>(tensor, raw, i64::from_le_bytes)?,
        "FP32" => contents.fp32_contents = fixed::<4, _>(tensor, raw, f32::from_le_bytes)?,
        "FP64" => contents.fp64_contents = fixed::<8, _>(tensor, raw, f64::from_le_bytes)?,
        "BYTES" => contents.bytes_contents = length_prefixed(tensor, raw)?,
        other => {
            return Err(DecodeError::UnsupportedDatatype {
                tensor: tensor.to_string(),
                datatype: other.to_string(),
            })
        }
    }
    Ok(contents)
}

fn fixed<const N: usize, T>(
    tensor: &str,
    raw: &[u8],
    convert: impl Fn([u8; N]) -> T,
) -> Result<Vec<T>, DecodeError> {
    let chunks = raw.chunks_exact(N);
    if !chunks.remainder().is_empty() {
        return Err(DecodeError::MalformedRawContents {
            tensor: tensor.to_string(),
            reason: format!("{} bytes is not a multiple of {N}", raw.len()),
        });
    }
    Ok(chunks
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            convert(buf)
        })
        .collect())
}

/// BYTES elements are each prefixed by a 4-byte little-endian length.
fn length_prefixed(tensor: &str, mut raw: &[u8]) -> Result<Vec<Vec<u8>>, DecodeError> {
    let malformed = |reason: String| DecodeError::MalformedRawContents {
        tensor: tensor.to_string(),
        reason,
    };
    let mut elements = Vec::new();
    while !raw.is_empty() {
        if raw.len() < 4 {
            return Err(malformed(format!("truncated length prefix ({} bytes)", raw.len())));
        }
        let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        raw = &raw[4..];
        if raw.len() < len {
            return Err(malformed(format!(
                "element of {len} bytes but only {} remain",
                raw.len()
            )));
        }
        elements.push(raw[..len].to_vec());
        raw = &raw[len..];
    }
    Ok(elements)
}
