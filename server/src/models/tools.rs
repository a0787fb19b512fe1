//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Tool calling wire types shared by every provider

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// A function the model may call, in the OpenAI/Ollama `tools` shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// A tool call emitted by the model. Arguments are kept as raw JSON and only
/// validated by whoever dispatches the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Build an invocation from an argument payload that may arrive either as
    /// a JSON object or as a JSON-encoded string.
    pub fn from_raw_arguments(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            other => other,
        };
        Self::new(name, arguments)
    }
}

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").ok());

/// Recover tool calls from a text completion.
///
/// Some local models answer a tool-enabled request with the calls written out
/// as JSON in the message body instead of the native `tool_calls` field. This
/// accepts a single call object or an array of them, optionally inside a
/// markdown code fence. Anything else yields no calls.
pub fn parse_text_tool_calls(text: &str) -> Vec<ToolInvocation> {
    let body = CODE_FENCE
        .as_ref()
        .and_then(|fence| fence.captures(text))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("tool_calls") {
            Some(Value::Array(items)) => items,
            Some(_) => Vec::new(),
            None => vec![Value::Object(object)],
        },
        _ => Vec::new(),
    };

    items.into_iter().filter_map(invocation_from_value).collect()
}

fn invocation_from_value(value: Value) -> Option<ToolInvocation> {
    let mut object = match value {
        Value::Object(object) => object,
        _ => return None,
    };
    if let Some(Value::Object(function)) = object.remove("function") {
        object = function;
    }
    let name = object.get("name")?.as_str()?.to_string();
    let arguments = object
        .remove("arguments")
        .or_else(|| object.remove("parameters"))
        .unwrap_or(Value::Object(Default::default()));
    Some(ToolInvocation::from_raw_arguments(name, arguments))
}
