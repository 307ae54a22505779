use rocket::{serde::json::Json, Route, State};

use crate::{
    assistant::Assistant,
    logging::RequestId,
    model::api::assistant::{AssistantReply, AssistantRequest},
};

pub fn routes() -> Vec<Route> {
    routes![ask]
}

/// Ask the helper a question. Open to anyone, and always answers.
#[post("/assistant", data = "<request>", format = "json")]
async fn ask(
    request: Json<AssistantRequest>,
    request_id: RequestId,
    assistant: &State<Assistant>,
) -> Json<AssistantReply> {
    let AssistantRequest { message, context } = request.into_inner();
    debug!("{request_id}: assistant asked {} chars", message.chars().count());
    let response = assistant.respond(&message, context.as_ref()).await;
    Json(AssistantReply { response })
}
