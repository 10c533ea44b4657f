//! Stable element tokens.
//!
//! A token is written once onto the node as an attribute and read back on
//! every later reference, so the panel can address elements across
//! messages without holding live handles. Tokens die with the page.

use crate::dom::Dom;
use uuid::Uuid;

/// Attribute carrying the token.
pub const TOKEN_ATTR: &str = "data-styleprobe-id";

const TOKEN_PREFIX: &str = "sp-";
const TOKEN_LEN: usize = 10;
const MAX_MINT_ATTEMPTS: usize = 8;

/// Assigns and resolves element tokens.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    minted: usize,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of `element`, minting and attaching one on first use.
    pub fn id_of<D: Dom>(&mut self, dom: &D, element: &D::Element) -> String {
        if let Some(token) = dom.attribute(element, TOKEN_ATTR).filter(|t| !t.is_empty()) {
            return token;
        }
        let token = self.mint(dom);
        dom.set_attribute(element, TOKEN_ATTR, &token);
        token
    }

    /// Live element carrying `token`, if any.
    pub fn resolve<D: Dom>(&self, dom: &D, token: &str) -> Option<D::Element> {
        if token.is_empty() {
            return None;
        }
        dom.find_by_attribute(TOKEN_ATTR, token)
            .filter(|element| dom.is_connected(element))
    }

    /// Number of tokens minted by this registry.
    pub fn minted(&self) -> usize {
        self.minted
    }

    fn mint<D: Dom>(&mut self, dom: &D) -> String {
        let mut token = random_token();
        for _ in 1..MAX_MINT_ATTEMPTS {
            if dom.find_by_attribute(TOKEN_ATTR, &token).is_none() {
                break;
            }
            log::debug!("Token collision on {}, minting again", token);
            token = random_token();
        }
        self.minted += 1;
        token
    }
}

fn random_token() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", TOKEN_PREFIX, &hex[..TOKEN_LEN])
}
