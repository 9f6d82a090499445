//! Proposal data model and lifecycle classification.
//!
//! Lifecycle is never stored. Every call to [`classify`] derives the buckets
//! from `(deadline, now, execution set)` so a late vote or execution record is
//! picked up on the next poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};

use crate::amount::Amount;
use crate::contracts::Address;

pub type ProposalId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct ProposalMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "imageURL", default)]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(deserialize_with = "wire::integer")]
    pub proposal_id: ProposalId,
    #[serde(default)]
    pub metadata: ProposalMetadata,
    #[serde(deserialize_with = "wire::epoch_seconds")]
    pub deadline: DateTime<Utc>,
    #[serde(deserialize_with = "wire::integer")]
    pub minimum_votes: u64,
    #[serde(deserialize_with = "wire::integer")]
    pub proposed_donation_amount: Amount,
    pub recipient: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    #[serde(deserialize_with = "wire::integer")]
    pub proposal_id: ProposalId,
    pub voter: Address,
    #[serde(deserialize_with = "wire::integer")]
    pub amount: u64,
    #[serde(deserialize_with = "wire::in_support")]
    pub in_support: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    #[serde(deserialize_with = "wire::integer")]
    pub proposal_id: ProposalId,
}

/// The raw document served by the event indexer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventFeed {
    #[serde(default)]
    pub proposals_created: Vec<Proposal>,
    #[serde(default)]
    pub proposals_voted: Vec<Vote>,
    #[serde(default)]
    pub proposals_executed: Vec<ExecutionRecord>,
}

impl EventFeed {
    pub fn execution_set(&self) -> HashSet<ProposalId> {
        self.proposals_executed.iter().map(|e| e.proposal_id).collect()
    }

    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals_created.iter().find(|p| p.proposal_id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Active,
    Expired,
    Executed,
}

impl Lifecycle {
    pub fn of(proposal: &Proposal, executed: &HashSet<ProposalId>, now: DateTime<Utc>) -> Self {
        if executed.contains(&proposal.proposal_id) {
            Lifecycle::Executed
        } else if proposal.deadline > now {
            Lifecycle::Active
        } else {
            Lifecycle::Expired
        }
    }
}

/// A proposal together with the votes cast on it, in feed order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalView<'a> {
    pub proposal: &'a Proposal,
    pub votes: Vec<&'a Vote>,
    pub lifecycle: Lifecycle,
}

impl<'a> ProposalView<'a> {
    /// First vote recorded for `voter`, if any.
    pub fn vote_by(&self, voter: Address) -> Option<&'a Vote> {
        self.votes.iter().copied().find(|v| v.voter == voter)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification<'a> {
    pub active: Vec<ProposalView<'a>>,
    pub expired: Vec<ProposalView<'a>>,
    pub executed: Vec<ProposalView<'a>>,
}

impl<'a> Classification<'a> {
    pub fn find(&self, id: ProposalId) -> Option<&ProposalView<'a>> {
        self.active
            .iter()
            .chain(&self.expired)
            .chain(&self.executed)
            .find(|v| v.proposal.proposal_id == id)
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.expired.len() + self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition the feed into disjoint lifecycle buckets, keeping feed order.
pub fn classify(feed: &EventFeed, now: DateTime<Utc>) -> Classification<'_> {
    let executed = feed.execution_set();

    let mut votes_by_proposal: HashMap<ProposalId, Vec<&Vote>> = HashMap::new();
    for vote in &feed.proposals_voted {
        votes_by_proposal.entry(vote.proposal_id).or_default().push(vote);
    }

    let mut buckets = Classification::default();
    for proposal in &feed.proposals_created {
        let lifecycle = Lifecycle::of(proposal, &executed, now);
        let view = ProposalView {
            proposal,
            votes: votes_by_proposal.get(&proposal.proposal_id).cloned().unwrap_or_default(),
            lifecycle,
        };
        match lifecycle {
            Lifecycle::Active => buckets.active.push(view),
            Lifecycle::Expired => buckets.expired.push(view),
            Lifecycle::Executed => buckets.executed.push(view),
        }
    }
    buckets
}

mod wire {
    //! The indexer serializes big integers as strings and booleans as the
    //! literal `"true"`; accept both shapes.

    use super::*;
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    pub fn integer<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u128>,
    {
        let raw = match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => u128::from(n),
            NumberOrString::String(s) => s
                .trim()
                .parse::<u128>()
                .map_err(|_| D::Error::custom(format!("invalid integer: {:?}", s)))?,
        };
        T::try_from(raw).map_err(|_| D::Error::custom(format!("integer out of range: {}", raw)))
    }

    pub fn epoch_seconds<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: i64 = integer(deserializer)?;
        DateTime::from_timestamp(secs, 0).ok_or_else(|| D::Error::custom(format!("deadline out of range: {}", secs)))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    /// Only the literal `"true"` (or JSON `true`) counts as support.
    pub fn in_support<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match BoolOrString::deserialize(deserializer)? {
            BoolOrString::Bool(b) => b,
            BoolOrString::String(s) => s == "true",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    const VOTER_A: &str = "0x00000000000000000000000000000000000000a1";
    const VOTER_B: &str = "0x00000000000000000000000000000000000000b2";

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn proposal(id: ProposalId, deadline: DateTime<Utc>) -> Proposal {
        Proposal {
            proposal_id: id,
            metadata: ProposalMetadata::default(),
            deadline,
            minimum_votes: 1,
            proposed_donation_amount: 1_000,
            recipient: Address::from_bytes([0xcc; 20]),
        }
    }

    fn vote(id: ProposalId, voter: &str, in_support: bool) -> Vote {
        Vote {
            proposal_id: id,
            voter: voter.parse().unwrap(),
            amount: 1,
            in_support,
        }
    }

    fn ids(views: &[ProposalView<'_>]) -> Vec<ProposalId> {
        views.iter().map(|v| v.proposal.proposal_id).collect()
    }

    #[test]
    fn test_feed_deserializes_wire_shapes() {
        let raw = json!({
            "proposalsCreated": [{
                "proposalId": "7",
                "metadata": { "title": "Wells", "description": "Clean water", "imageURL": "ipfs://x" },
                "deadline": 1700000000,
                "minimumVotes": "4",
                "proposedDonationAmount": "250000000000000000000",
                "recipient": VOTER_B
            }],
            "proposalsVoted": [
                { "proposalId": 7, "voter": VOTER_A, "amount": "3", "inSupport": "true" },
                { "proposalId": "7", "voter": VOTER_B, "amount": 1, "inSupport": "false" }
            ],
            "proposalsExecuted": [{ "proposalId": "3" }]
        });

        let feed: EventFeed = serde_json::from_value(raw).unwrap();
        let p = &feed.proposals_created[0];
        assert_eq!(p.proposal_id, 7);
        assert_eq!(p.metadata.image_url, "ipfs://x");
        assert_eq!(p.deadline, now());
        assert_eq!(p.minimum_votes, 4);
        assert_eq!(p.proposed_donation_amount, 250 * 10u128.pow(18));
        assert!(feed.proposals_voted[0].in_support);
        assert!(!feed.proposals_voted[1].in_support);
        assert_eq!(feed.execution_set(), HashSet::from([3]));
    }

    #[test]
    fn test_in_support_only_literal_true() {
        for (wire, expected) in [("\"true\"", true), ("\"TRUE\"", false), ("\"yes\"", false), ("true", true), ("false", false)] {
            let raw = format!(
                r#"{{"proposalId":1,"voter":"{}","amount":1,"inSupport":{}}}"#,
                VOTER_A, wire
            );
            let vote: Vote = serde_json::from_str(&raw).unwrap();
            assert_eq!(vote.in_support, expected, "wire value {}", wire);
        }
    }

    #[test]
    fn test_malformed_feed_is_rejected() {
        let raw = json!({ "proposalsCreated": [{ "proposalId": "abc" }] });
        assert!(serde_json::from_value::<EventFeed>(raw).is_err());
    }

    #[test]
    fn test_buckets_are_disjoint_and_exhaustive() {
        let feed = EventFeed {
            proposals_created: vec![
                proposal(1, now() + Duration::hours(1)),
                proposal(2, now() - Duration::hours(1)),
                proposal(3, now() - Duration::hours(1)),
                proposal(4, now()),
                proposal(5, now() + Duration::hours(2)),
            ],
            proposals_voted: vec![],
            proposals_executed: vec![ExecutionRecord { proposal_id: 3 }],
        };

        let buckets = classify(&feed, now());
        assert_eq!(ids(&buckets.active), vec![1, 5]);
        assert_eq!(ids(&buckets.expired), vec![2, 4]);
        assert_eq!(ids(&buckets.executed), vec![3]);
        assert_eq!(buckets.len(), feed.proposals_created.len());
    }

    #[test]
    fn test_execution_set_wins_over_future_deadline() {
        let feed = EventFeed {
            proposals_created: vec![proposal(9, now() + Duration::days(1))],
            proposals_voted: vec![],
            proposals_executed: vec![ExecutionRecord { proposal_id: 9 }],
        };
        let buckets = classify(&feed, now());
        assert!(buckets.active.is_empty());
        assert_eq!(ids(&buckets.executed), vec![9]);
    }

    #[test]
    fn test_votes_attached_in_feed_order() {
        let feed = EventFeed {
            proposals_created: vec![proposal(1, now() + Duration::hours(1)), proposal(2, now())],
            proposals_voted: vec![vote(2, VOTER_A, true), vote(1, VOTER_B, false), vote(2, VOTER_B, false)],
            proposals_executed: vec![],
        };
        let buckets = classify(&feed, now());
        let second = buckets.find(2).unwrap();
        assert_eq!(second.votes.len(), 2);
        assert!(second.votes[0].in_support);
        assert!(!second.votes[1].in_support);
        assert_eq!(buckets.find(1).unwrap().votes.len(), 1);
    }

    #[test]
    fn test_vote_by_first_match_wins() {
        let feed = EventFeed {
            proposals_created: vec![proposal(7, now() + Duration::hours(1))],
            proposals_voted: vec![vote(7, VOTER_A, false), vote(7, VOTER_A, true)],
            proposals_executed: vec![],
        };
        let buckets = classify(&feed, now());
        let view = buckets.find(7).unwrap();
        let mine = view.vote_by(VOTER_A.parse().unwrap()).unwrap();
        assert!(!mine.in_support);
        assert!(view.vote_by(VOTER_B.parse().unwrap()).is_none());
    }

    #[test]
    fn test_classification_is_idempotent() {
        let feed = EventFeed {
            proposals_created: vec![proposal(1, now()), proposal(2, now() + Duration::seconds(1))],
            proposals_voted: vec![vote(1, VOTER_A, true)],
            proposals_executed: vec![],
        };
        assert_eq!(classify(&feed, now()), classify(&feed, now()));
    }

    #[test]
    fn test_classification_follows_the_clock() {
        let feed = EventFeed {
            proposals_created: vec![proposal(1, now() + Duration::seconds(30))],
            ..Default::default()
        };
        assert_eq!(classify(&feed, now()).active.len(), 1);
        assert_eq!(classify(&feed, now() + Duration::seconds(30)).expired.len(), 1);
    }
}
