//! # Módulo `parameters`
//! src/handlers/parameters.rs
//!
//! Parámetros con nombre de un documento. Depende del módulo `documents`:
//! sin él no hay forma de crear los documentos que esto modifica.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;

use super::{bad_request, parse_json_body, request_options, respond};
use crate::bridge::BridgeClient;
use crate::host::DocumentHost;
use crate::http::{Method, Request, Response, StatusCode};
use crate::modules::ModuleDescriptor;
use crate::router::{handler, PathParams};

pub const MODULE_NAME: &str = "parameters";

#[derive(Debug, Deserialize)]
struct SetParameter {
    value: f64,
}

pub fn module<H: DocumentHost>(client: BridgeClient<H>) -> ModuleDescriptor {
    ModuleDescriptor::new(MODULE_NAME, "design")
        .depends_on("parameter.read")
        .depends_on("parameter.write")
        .depends_on(super::documents::MODULE_NAME)
        .route("/documents/{doc_id}/parameters", &[Method::GET], "List document parameters", {
            let client = client.clone();
            handler(move |req, params| list(&client, req, params))
        })
        .route(
            "/documents/{doc_id}/parameters/{name}",
            &[Method::PUT],
            "Set a document parameter",
            handler(move |req, params| set(&client, req, params)),
        )
}

fn list<H: DocumentHost>(client: &BridgeClient<H>, req: &Request, params: &PathParams) -> Response {
    let options = match request_options(req, client) {
        Ok(options) => options,
        Err(response) => return response,
    };
    let Some(doc_id) = params.get("doc_id").map(str::to_string) else {
        return bad_request("missing path parameter 'doc_id'");
    };

    let result = client.submit_and_wait("list_parameters", options.priority, options.timeout, {
        let doc_id = doc_id.clone();
        move |host: &mut H| host.parameters(&doc_id).map_err(Into::into)
    });
    respond(result, MODULE_NAME, "list_parameters", StatusCode::Ok, |parameters: BTreeMap<String, f64>| {
        json!({ "document": doc_id, "parameters": parameters })
    })
}

fn set<H: DocumentHost>(client: &BridgeClient<H>, req: &Request, params: &PathParams) -> Response {
    let options = match request_options(req, client) {
        Ok(options) => options,
        Err(response) => return response,
    };
    let (Some(doc_id), Some(name)) = (params.get("doc_id"), params.get("name")) else {
        return bad_request("missing path parameters 'doc_id' and 'name'");
    };
    let body: SetParameter = match parse_json_body(req) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if !body.value.is_finite() {
        return bad_request("field 'value' must be a finite number");
    }

    let (doc_id, name) = (doc_id.to_string(), name.to_string());
    let result = client.submit_and_wait("set_parameter", options.priority, options.timeout, move |host: &mut H| {
        host.set_parameter(&doc_id, &name, body.value).map_err(Into::into)
    });
    respond(result, MODULE_NAME, "set_parameter", StatusCode::Ok, |document| json!(document))
}
