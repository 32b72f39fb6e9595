use hustleflow_types::api::{OfferView, PartyView, RequestView};
use hustleflow_types::models::{ExchangeRequest, OfferStatus, PartySnapshot};

/// Who is looking at the board. Determines which private identity fields
/// the projection fills in; re-derived on every read, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer<'a> {
    Anonymous,
    Token(&'a str),
    Admin,
}

impl<'a> Viewer<'a> {
    /// Classify a bearer token against the configured admin token.
    pub fn classify(token: Option<&'a str>, is_admin: bool) -> Self {
        match token {
            Some(_) if is_admin => Viewer::Admin,
            Some(token) => Viewer::Token(token),
            None => Viewer::Anonymous,
        }
    }

    fn token(&self) -> Option<&str> {
        match self {
            Viewer::Token(token) => Some(token),
            _ => None,
        }
    }
}

/// Project a request for one viewer.
///
/// The owner's private fields are disclosed to the owner themself, to the
/// admin, and to the offerer whose offer was accepted. An offerer's private
/// fields are disclosed to that offerer and to the request owner, who needs
/// them to pick a counterparty. Everyone else sees aliases only.
pub fn project_request(request: &ExchangeRequest, viewer: &Viewer<'_>) -> RequestView {
    let is_owner = viewer.token() == Some(request.owner.token.as_str());

    let owner_disclosed = match viewer {
        Viewer::Admin => true,
        Viewer::Anonymous => false,
        Viewer::Token(token) => {
            is_owner
                || request
                    .offers
                    .iter()
                    .any(|o| o.status == OfferStatus::Accepted && o.offerer.token == *token)
        }
    };

    let offers = request
        .offers
        .iter()
        .map(|offer| {
            let mine = viewer.token() == Some(offer.offerer.token.as_str());
            let disclosed = matches!(viewer, Viewer::Admin) || is_owner || mine;
            OfferView {
                id: offer.id,
                amount: offer.amount,
                status: offer.status,
                created_at: offer.created_at,
                offerer: project_party(&offer.offerer, disclosed),
                mine,
            }
        })
        .collect();

    RequestView {
        id: request.id,
        amount: request.amount,
        currency: request.currency.clone(),
        kind: request.kind,
        urgency: request.urgency,
        duration_days: request.duration_days,
        status: request.status(),
        created_at: request.created_at,
        expires_at: request.expires_at(),
        owner: project_party(&request.owner, owner_disclosed),
        offers,
        mine: is_owner,
    }
}

fn project_party(party: &PartySnapshot, disclosed: bool) -> PartyView {
    if disclosed {
        PartyView {
            display_alias: party.display_alias.clone(),
            real_name: Some(party.real_name.clone()),
            room: Some(party.room.clone()),
            contact: party.contact.clone(),
        }
    } else {
        PartyView {
            display_alias: party.display_alias.clone(),
            real_name: None,
            room: None,
            contact: None,
        }
    }
}
