//! Inbound reply handling.

mod classifier;
mod processor;

pub use classifier::{
    classify, should_advance, Intent, ReplyAnalysis, Sentiment, SuggestedAction,
};
pub use processor::{
    reply_query, sender_address, CommandMailSource, MailMessage, MailSource, ProcessedReplies,
    ReplyDetail, ReplyProcessor, ReplyReport, ReplyRequest, TargetContact, MAX_QUERY_ADDRESSES,
    MAX_SEARCH_RESULTS, PROCESSED_REPLIES_FILE,
};
