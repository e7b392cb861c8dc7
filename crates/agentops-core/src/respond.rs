//! Goal-to-response generation.
//!
//! A pure, stateless function from goal text to a templated customer-support
//! email. Keyword rules pick the template; anything unmatched falls back to a
//! generic reply that quotes the goal.

use std::sync::OnceLock;

use regex::Regex;

const SIGN_OFF: &str = "Best regards,\nSupport Team";

/// Generate the final response body for a goal.
pub fn generate_response(goal: &str) -> String {
    let goal = goal.trim();
    let lower = goal.to_lowercase();

    if lower.contains("refund") {
        return refund_template();
    }

    if lower.contains("apology") || lower.contains("late") || lower.contains("delay") {
        return apology_template(&lower);
    }

    fallback_template(goal)
}

/// Extract a one or two digit discount percentage ("10%", "15 percent").
pub fn extract_discount(goal: &str) -> Option<String> {
    static DISCOUNT: OnceLock<Regex> = OnceLock::new();
    let re = DISCOUNT.get_or_init(|| {
        Regex::new(r"(\d{1,2})\s*%|\b(\d{1,2})\s*percent\b").unwrap()
    });

    let lower = goal.to_lowercase();
    let caps = re.captures(&lower)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

fn refund_template() -> String {
    format!(
        "Subject: Refund Approved – Next Steps\n\n\
         Hi [Customer Name],\n\n\
         Thanks for reaching out. I’ve reviewed your request and I’m happy to confirm your refund has been approved.\n\n\
         Next steps:\n\
         1) We’ve initiated the refund to your original payment method.\n\
         2) Processing time is typically 3–7 business days depending on your bank/card provider.\n\
         3) You’ll receive a confirmation email once the refund is completed.\n\n\
         If you have any questions or need help with anything else, just reply to this message.\n\n\
         {SIGN_OFF}"
    )
}

fn apology_template(lower: &str) -> String {
    let offer_line = match extract_discount(lower) {
        Some(disc) => format!(
            "To make it right, we’d like to offer you {disc}% off your next purchase. \
             Use code: SORRY{disc} at checkout.\n\n"
        ),
        None if lower.contains("free shipping") => {
            "To make it right, we’ve applied free shipping on your next order.\n\n".to_string()
        }
        None => {
            "To make it right, we’d like to offer a discount on your next purchase.\n\n".to_string()
        }
    };

    format!(
        "Subject: Apology for the Delivery Delay\n\n\
         Hi [Customer Name],\n\n\
         I’m really sorry your order arrived later than expected. We understand how frustrating \
         that can be, and we appreciate your patience.\n\n\
         {offer_line}\
         We’re reviewing what happened to prevent this from happening again. If there’s anything \
         else I can do to help, please reply here and I’ll take care of it.\n\n\
         {SIGN_OFF}"
    )
}

fn fallback_template(goal: &str) -> String {
    format!(
        "Subject: Response to Your Request\n\n\
         Hi [Customer Name],\n\n\
         Thanks for reaching out. Here’s a response based on your request:\n\n\
         {goal}\n\n\
         If you can share any additional details, I can tailor this more precisely.\n\n\
         {SIGN_OFF}"
    )
}
