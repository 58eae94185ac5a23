use serde::Serialize;
use std::collections::HashMap;

use crate::evaluation::Feature;

// Flag keys read by the home page
pub const HELLO_TOGGLEBOT: &str = "hello-togglebot";
pub const TOGGLEBOT_SPEED: &str = "togglebot-speed";
pub const TOGGLEBOT_WINK: &str = "togglebot-wink";
pub const EXAMPLE_TEXT: &str = "example-text";

// Defaults used when a flag cannot be evaluated
pub const DEFAULT_SPEED: &str = "off";
pub const DEFAULT_WINK: bool = false;
pub const DEFAULT_STEP: &str = "default";
pub const DEFAULT_VARIATION_NAME: &str = "Default";

pub const TOGGLEBOT_IMG: &str = "/assets/img/togglebot.png";
pub const TOGGLEBOT_WINK_IMG: &str = "/assets/img/togglebot-wink.png";
pub const UNICORN_IMG: &str = "/assets/img/unicorn.svg";

const WELCOME_HEADER: &str = "Welcome to DevCycle's example app.";

// Evaluated flag values for a single request
#[derive(Debug, Clone, Serialize)]
pub struct FlagSet {
    pub features: HashMap<String, Feature>,
    pub speed: String,
    pub wink: bool,
    pub step: String,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            features: HashMap::new(),
            speed: DEFAULT_SPEED.to_string(),
            wink: DEFAULT_WINK,
            step: DEFAULT_STEP.to_string(),
        }
    }
}

// Variables handed to the page renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayModel {
    pub variation_name: String,
    pub message: String,
    pub togglebot_image_src: String,
    pub header: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Onboarding {
    pub header: &'static str,
    pub body: &'static str,
}

impl DisplayModel {
    /// Derive every display variable from the evaluated flags
    pub fn from_flags(flags: &FlagSet) -> Self {
        let onboarding = compute_onboarding(&flags.step);

        Self {
            variation_name: compute_variation_name(&flags.features, HELLO_TOGGLEBOT),
            message: compute_message(&flags.speed).to_string(),
            togglebot_image_src: compute_togglebot_image(flags.wink, &flags.speed).to_string(),
            header: onboarding.header.to_string(),
            body: onboarding.body.to_string(),
        }
    }
}

/// Greeting shown under togglebot for a given `togglebot-speed` value.
/// Unknown speeds (including "off") get the default greeting.
pub fn compute_message(speed: &str) -> &'static str {
    match speed {
        "slow" => "Awesome, look at you go!",
        "fast" => "This is fun!",
        "off-axis" => "...I'm gonna be sick...",
        "surprise" => "What the unicorn?",
        _ => "Hello! Nice to meet you.",
    }
}

/// Onboarding copy for a given `example-text` value
pub fn compute_onboarding(step: &str) -> Onboarding {
    match step {
        "step-1" => Onboarding {
            header: WELCOME_HEADER,
            body: "If you got here through the onboarding flow, just follow the instructions to change and create new Variations and see how the app reacts to new Variable values.",
        },
        "step-2" => Onboarding {
            header: "Great! You've taken the first step in exploring DevCycle.",
            body: "You've successfully toggled your very first Variation. You are now serving a different value to your users and you can see how the example app has reacted to this change. Next, go ahead and create a whole new Variation to see what else is possible in this app.",
        },
        "step-3" => Onboarding {
            header: "You're getting the hang of things.",
            body: "By creating a new Variation with new Variable values and toggling it on for all users, you've already explored the fundamental concepts within DevCycle. There's still so much more to the platform, so go ahead and complete the onboarding flow and play around with the feature that controls this example in your dashboard.",
        },
        _ => Onboarding {
            header: WELCOME_HEADER,
            body: "If you got to the example app on your own, follow our README guide to create the Feature and Variables you need to control this app in DevCycle.",
        },
    }
}

/// Image path for togglebot.
/// A "surprise" speed always shows the unicorn, even when wink is on.
pub fn compute_togglebot_image(wink: bool, speed: &str) -> &'static str {
    if speed == "surprise" {
        return UNICORN_IMG;
    }

    if wink {
        TOGGLEBOT_WINK_IMG
    } else {
        TOGGLEBOT_IMG
    }
}

/// Variation name served for `key`, or "Default" when the feature is
/// missing or carries no data at all
pub fn compute_variation_name(features: &HashMap<String, Feature>, key: &str) -> String {
    features
        .get(key)
        .filter(|feature| !feature.is_empty())
        .map(|feature| feature.variation_name.clone())
        .unwrap_or_else(|| DEFAULT_VARIATION_NAME.to_string())
}
