use axum::{extract::State, response::Html, Json};
use serde::Serialize;
use tracing::info;

use crate::evaluation::{DevCycleUser, EvaluationContext};
use crate::presentation::{
    DisplayModel, FlagSet, DEFAULT_SPEED, DEFAULT_STEP, DEFAULT_WINK, EXAMPLE_TEXT,
    TOGGLEBOT_SPEED, TOGGLEBOT_WINK,
};
use crate::render::{render_home, HomePage};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DisplayResponse {
    pub display: DisplayModel,
    pub flags: FlagSet,
    pub user: DevCycleUser,
}

/// Evaluate every flag the page needs for the configured user
async fn evaluate_flags(state: &AppState) -> FlagSet {
    let context = EvaluationContext::from(&state.user);

    let (features, speed, wink, step) = tokio::join!(
        state.flags.all_features(&context),
        state
            .flags
            .get_string_value(TOGGLEBOT_SPEED, DEFAULT_SPEED, &context),
        state
            .flags
            .get_boolean_value(TOGGLEBOT_WINK, DEFAULT_WINK, &context),
        state
            .flags
            .get_string_value(EXAMPLE_TEXT, DEFAULT_STEP, &context),
    );

    info!(
        user_id = %state.user.user_id,
        speed = %speed,
        wink = wink,
        step = %step,
        features = features.len(),
        "Evaluated flags"
    );

    FlagSet {
        features,
        speed,
        wink,
        step,
    }
}

/// Render the togglebot page
pub async fn home(State(state): State<AppState>) -> Html<String> {
    let flags = evaluate_flags(&state).await;
    let display = DisplayModel::from_flags(&flags);

    Html(render_home(&HomePage {
        display: &display,
        flags: &flags,
        user_id: &state.user.user_id,
        provider: state.flags.provider_name(),
    }))
}

/// Same values as the page, as JSON
pub async fn display(State(state): State<AppState>) -> Json<DisplayResponse> {
    let flags = evaluate_flags(&state).await;

    Json(DisplayResponse {
        display: DisplayModel::from_flags(&flags),
        flags,
        user: state.user.clone(),
    })
}
