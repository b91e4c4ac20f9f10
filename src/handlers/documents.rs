//! # Módulo `documents`
//! src/handlers/documents.rs
//!
//! Listar, crear, consultar y cerrar documentos del host. Cada operación
//! es un task del main thread; el handler solo valida la entrada y espera
//! el resultado.
//!
//! | Método | Ruta                    | Operación         |
//! |--------|-------------------------|-------------------|
//! | GET    | `/documents`            | `list_documents`  |
//! | POST   | `/documents`            | `create_document` |
//! | GET    | `/documents/{doc_id}`   | `get_document`    |
//! | DELETE | `/documents/{doc_id}`   | `close_document`  |

use serde::Deserialize;
use serde_json::json;

use super::{accepted, bad_request, error_response, parse_json_body, request_options, respond};
use crate::bridge::BridgeClient;
use crate::host::DocumentHost;
use crate::http::{Method, Request, Response, StatusCode};
use crate::modules::ModuleDescriptor;
use crate::router::{handler, PathParams};

pub const MODULE_NAME: &str = "documents";

#[derive(Debug, Deserialize)]
struct CreateDocument {
    name: String,
    units: String,
}

pub fn module<H: DocumentHost>(client: BridgeClient<H>) -> ModuleDescriptor {
    ModuleDescriptor::new(MODULE_NAME, "design")
        .depends_on("document.read")
        .depends_on("document.write")
        .route("/documents", &[Method::GET], "List open documents", {
            let client = client.clone();
            handler(move |req, _| list(&client, req))
        })
        .route("/documents", &[Method::POST], "Create a document", {
            let client = client.clone();
            handler(move |req, _| create(&client, req))
        })
        .route("/documents/{doc_id}", &[Method::GET], "Get a document", {
            let client = client.clone();
            handler(move |req, params| get(&client, req, params))
        })
        .route("/documents/{doc_id}", &[Method::DELETE], "Close a document", {
            handler(move |req, params| close(&client, req, params))
        })
}

fn list<H: DocumentHost>(client: &BridgeClient<H>, req: &Request) -> Response {
    let options = match request_options(req, client) {
        Ok(options) => options,
        Err(response) => return response,
    };

    let result = client.submit_and_wait("list_documents", options.priority, options.timeout, |host: &mut H| {
        host.list_documents().map_err(Into::into)
    });
    respond(result, MODULE_NAME, "list_documents", StatusCode::Ok, |documents| {
        json!({ "count": documents.len(), "documents": documents })
    })
}

fn create<H: DocumentHost>(client: &BridgeClient<H>, req: &Request) -> Response {
    let options = match request_options(req, client) {
        Ok(options) => options,
        Err(response) => return response,
    };
    let body: CreateDocument = match parse_json_body(req) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.name.trim().is_empty() {
        return bad_request("field 'name' must not be empty");
    }
    if body.units.trim().is_empty() {
        return bad_request("field 'units' must not be empty");
    }

    let result = client.submit_and_wait("create_document", options.priority, options.timeout, move |host: &mut H| {
        host.create_document(&body.name, &body.units).map_err(Into::into)
    });
    respond(result, MODULE_NAME, "create_document", StatusCode::Created, |document| json!(document))
}

fn get<H: DocumentHost>(client: &BridgeClient<H>, req: &Request, params: &PathParams) -> Response {
    let options = match request_options(req, client) {
        Ok(options) => options,
        Err(response) => return response,
    };
    let Some(doc_id) = params.get("doc_id").map(str::to_string) else {
        return bad_request("missing path parameter 'doc_id'");
    };

    let result = client.submit_and_wait("get_document", options.priority, options.timeout, move |host: &mut H| {
        host.document(&doc_id).map_err(Into::into)
    });
    respond(result, MODULE_NAME, "get_document", StatusCode::Ok, |document| json!(document))
}

fn close<H: DocumentHost>(client: &BridgeClient<H>, req: &Request, params: &PathParams) -> Response {
    let options = match request_options(req, client) {
        Ok(options) => options,
        Err(response) => return response,
    };
    let Some(doc_id) = params.get("doc_id").map(str::to_string) else {
        return bad_request("missing path parameter 'doc_id'");
    };

    if options.detached {
        let op_id = doc_id.clone();
        return match client.submit_fire_and_forget("close_document", options.priority, move |host: &mut H| {
            host.close_document(&op_id).map_err(Into::into)
        }) {
            Ok(task_id) => accepted(task_id, "close_document"),
            Err(err) => error_response(&err, MODULE_NAME, "close_document"),
        };
    }

    let result = client.submit_and_wait("close_document", options.priority, options.timeout, {
        let doc_id = doc_id.clone();
        move |host: &mut H| host.close_document(&doc_id).map_err(Into::into)
    });
    respond(result, MODULE_NAME, "close_document", StatusCode::Ok, |()| {
        json!({ "id": doc_id, "closed": true })
    })
}
