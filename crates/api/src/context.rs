//! Request scope carried by headers.

use axum::http::HeaderMap;

use forgeship_core::{LanguageId, RequestContext, ShopGroupId, ShopId};

pub const SHOP_ID_HEADER: &str = "x-shop-id";
pub const SHOP_GROUP_ID_HEADER: &str = "x-shop-group-id";
pub const LANGUAGE_ID_HEADER: &str = "x-language-id";

/// Language used when the request names none.
pub const DEFAULT_LANGUAGE: LanguageId = LanguageId::new(1);

/// Build the request scope. Absent headers widen the scope (no shop means
/// every shop); malformed ones are rejected.
pub fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext, String> {
    let shop_id = parse_id(headers, SHOP_ID_HEADER)?.map(ShopId::new);
    let shop_group_id = parse_id(headers, SHOP_GROUP_ID_HEADER)?.map(ShopGroupId::new);
    let language_id = parse_id(headers, LANGUAGE_ID_HEADER)?
        .map(LanguageId::new)
        .unwrap_or(DEFAULT_LANGUAGE);

    Ok(RequestContext::new(shop_id, shop_group_id, language_id))
}

fn parse_id(headers: &HeaderMap, name: &str) -> Result<Option<u32>, String> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| format!("{name} must be ASCII"))?
        .trim();
    match value.parse::<u32>() {
        Ok(0) => Ok(None),
        Ok(id) => Ok(Some(id)),
        Err(_) => Err(format!("{name} must be a positive integer, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn headers_map_onto_the_request_context() {
        let mut headers = HeaderMap::new();
        headers.insert(SHOP_ID_HEADER, HeaderValue::from_static("3"));
        headers.insert(SHOP_GROUP_ID_HEADER, HeaderValue::from_static("2"));

        let ctx = context_from_headers(&headers).unwrap();
        assert_eq!(ctx.shop_id(), Some(ShopId::new(3)));
        assert_eq!(ctx.shop_group_id(), Some(ShopGroupId::new(2)));
        assert_eq!(ctx.language_id(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn zero_means_unscoped_and_garbage_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(SHOP_ID_HEADER, HeaderValue::from_static("0"));
        assert_eq!(context_from_headers(&headers).unwrap().shop_id(), None);

        headers.insert(SHOP_ID_HEADER, HeaderValue::from_static("shop-1"));
        assert!(context_from_headers(&headers).is_err());
    }
}
