//! C5: the ContentDirectory SOAP sub-protocol over HTTP POST.

use axum::http::StatusCode;

use crate::config::ServerConfig;
use crate::didl::{BrowseMode, DidlObject};
use crate::error::{SoapErrorCode, SoapFault};
use crate::templates::{self, TemplateBundle};
use crate::xml::{self, Content};

/// Handle one POST to `/content-directory.xml`: parse, dispatch, and always
/// produce a body — a success envelope or a filled fault template.
pub async fn handle_request(
    bundle: &TemplateBundle,
    config: &ServerConfig,
    soapaction: Option<&str>,
    body: &[u8],
) -> (StatusCode, String) {
    match dispatch(bundle, config, soapaction, body).await {
        Ok(xml_body) => (StatusCode::OK, xml_body),
        Err(fault) => {
            let rendered = bundle
                .render(
                    templates::FAULT,
                    &[
                        ("errorCode", &fault.code.code().to_string()),
                        ("errorDescription", fault.code.description()),
                    ],
                )
                .unwrap_or_else(|_| format!("<!-- fault rendering failed: {fault} -->"));
            (StatusCode::INTERNAL_SERVER_ERROR, rendered)
        }
    }
}

async fn dispatch(
    bundle: &TemplateBundle,
    config: &ServerConfig,
    soapaction: Option<&str>,
    body: &[u8],
) -> Result<String, SoapFault> {
    let action = parse_action(soapaction).ok_or_else(|| SoapFault::new(SoapErrorCode::InvalidAction))?;
    let root = xml::parse_bytes(body).map_err(|_| SoapFault::new(SoapErrorCode::InvalidArgs))?;

    match normalize_action(&action).as_str() {
        "browse" => do_browse(&root, config, bundle, BrowseMode::Browse, "ObjectID", templates::BROWSE_RESPONSE).await,
        "search" => do_browse(&root, config, bundle, BrowseMode::Search, "ContainerID", templates::SEARCH_RESPONSE).await,
        "getsearchcapabilities" => bundle
            .raw(templates::SEARCH_CAPABILITIES)
            .map_err(|_| SoapFault::new(SoapErrorCode::ActionFailed)),
        _ => Err(SoapFault::new(SoapErrorCode::InvalidAction)),
    }
}

/// `SOAPACTION: "<service-urn>#<action>"` → the bare action name.
fn parse_action(header: Option<&str>) -> Option<String> {
    let raw = header?.trim().trim_matches('"');
    let (_, action) = raw.split_once('#')?;
    Some(action.to_string())
}

/// Non-alphanumeric runs collapse to `_`, lowercased — a conservative
/// method-identifier rule shared conceptually with the SSDP method matcher.
fn normalize_action(action: &str) -> String {
    let mut out = String::with_capacity(action.len());
    let mut last_was_sep = false;
    for ch in action.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

async fn do_browse(
    request_body: &crate::xml::XmlElement,
    config: &ServerConfig,
    bundle: &TemplateBundle,
    mode: BrowseMode,
    id_field: &str,
    response_template: &str,
) -> Result<String, SoapFault> {
    let object_id = xml::find_text(request_body, id_field).map_err(|_| SoapFault::new(SoapErrorCode::InvalidArgs))?;
    let starting_index: usize = xml::find_text(request_body, "StartingIndex")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let requested_count: usize = xml::find_text(request_body, "RequestedCount")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(usize::MAX);

    let base_url = config.base_url();
    let object = DidlObject::new(&config.media_root, &base_url, &object_id, mode)
        .await
        .map_err(|_| SoapFault::new(SoapErrorCode::NoSuchObject))?;

    let children = object.children().await.map_err(|_| SoapFault::new(SoapErrorCode::ActionFailed))?;
    let total = children.len();
    let end = starting_index.saturating_add(requested_count).min(total);
    let slice = if starting_index >= total { &children[0..0] } else { &children[starting_index..end] };

    let mut elements = Vec::with_capacity(slice.len());
    for child in slice {
        elements.push(child.element(config.root_parent_mode).map_err(|_| SoapFault::new(SoapErrorCode::ActionFailed))?);
    }

    let didl = xml::build(
        "dlna:DIDL-Lite",
        elements.into_iter().map(Content::Child),
        &[],
    )
    .map_err(|_| SoapFault::new(SoapErrorCode::ActionFailed))?;
    let serialized_didl = xml::serialize(&didl).map_err(|_| SoapFault::new(SoapErrorCode::ActionFailed))?;

    bundle
        .render(
            response_template,
            &[
                ("Result", serialized_didl.as_str()),
                ("UpdateID", object.update().to_string().as_str()),
                ("TotalMatches", total.to_string().as_str()),
                ("NumberReturned", slice.len().to_string().as_str()),
            ],
        )
        .map_err(|_| SoapFault::new(SoapErrorCode::ActionFailed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_action_lowercases_and_collapses_separators() {
        assert_eq!(normalize_action("Browse"), "browse");
        assert_eq!(normalize_action("GetSearchCapabilities"), "getsearchcapabilities");
        assert_eq!(normalize_action("X-Vendor.Action"), "x_vendor_action");
    }

    #[test]
    fn parse_action_splits_urn_and_action() {
        let header = "\"urn:schemas-upnp-org:service:ContentDirectory:1#Browse\"";
        assert_eq!(parse_action(Some(header)).unwrap(), "Browse");
        assert_eq!(parse_action(None), None);
        assert_eq!(parse_action(Some("garbage")), None);
    }
}
