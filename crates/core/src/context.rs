//! Explicit request scope.

use serde::{Deserialize, Serialize};

use crate::id::{LanguageId, ShopGroupId, ShopId};

/// Shop / language scope of a request.
///
/// Passed into every public operation; nothing in the engine reads a "current
/// shop" from global state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    shop_id: Option<ShopId>,
    shop_group_id: Option<ShopGroupId>,
    language_id: LanguageId,
}

impl RequestContext {
    pub fn new(
        shop_id: Option<ShopId>,
        shop_group_id: Option<ShopGroupId>,
        language_id: LanguageId,
    ) -> Self {
        Self {
            shop_id,
            shop_group_id,
            language_id,
        }
    }

    /// Context of a single shop.
    pub fn for_shop(shop_id: ShopId, shop_group_id: ShopGroupId) -> Self {
        Self::new(Some(shop_id), Some(shop_group_id), LanguageId::new(1))
    }

    /// Context spanning every shop (back-office "all shops" view).
    pub fn all_shops() -> Self {
        Self::new(None, None, LanguageId::new(1))
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn shop_group_id(&self) -> Option<ShopGroupId> {
        self.shop_group_id
    }

    pub fn language_id(&self) -> LanguageId {
        self.language_id
    }

    pub fn with_language(mut self, language_id: LanguageId) -> Self {
        self.language_id = language_id;
        self
    }
}
