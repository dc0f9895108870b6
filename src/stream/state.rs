/// Offer/answer progress of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    PeerCreating,
    OfferGenerated,
    AnswerPending,
    Established,
    Failed,
    Disposed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Failed | NegotiationState::Disposed)
    }

    pub fn can_transition_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;
        match (self, next) {
            (Disposed, _) => false,
            (_, Disposed) => true,
            (Failed, _) => false,
            (_, Failed) => true,
            (Idle, PeerCreating)
            | (PeerCreating, OfferGenerated)
            | (OfferGenerated, AnswerPending)
            | (AnswerPending, Established) => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NegotiationState::Idle => "IDLE",
            NegotiationState::PeerCreating => "PEER_CREATING",
            NegotiationState::OfferGenerated => "OFFER_GENERATED",
            NegotiationState::AnswerPending => "ANSWER_PENDING",
            NegotiationState::Established => "ESTABLISHED",
            NegotiationState::Failed => "FAILED",
            NegotiationState::Disposed => "DISPOSED",
        }
    }
}

impl std::fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
