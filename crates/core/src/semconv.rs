//! Attribute keys and values from the OpenTelemetry GenAI semantic
//! conventions that the engine reads.

pub const OPERATION_NAME: &str = "gen_ai.operation.name";
pub const AGENT_NAME: &str = "gen_ai.agent.name";
pub const PROVIDER_NAME: &str = "gen_ai.provider.name";
pub const SYSTEM: &str = "gen_ai.system";
pub const REQUEST_MODEL: &str = "gen_ai.request.model";
pub const RESPONSE_MODEL: &str = "gen_ai.response.model";
pub const TOOL_NAME: &str = "gen_ai.tool.name";
pub const TOOL_CALL_ARGUMENTS: &str = "gen_ai.tool.call.arguments";
pub const USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

pub const OP_INVOKE_AGENT: &str = "invoke_agent";
pub const OP_CREATE_AGENT: &str = "create_agent";
pub const OP_EXECUTE_TOOL: &str = "execute_tool";
pub const OP_CHAT: &str = "chat";
pub const OP_TEXT_COMPLETION: &str = "text_completion";
pub const OP_GENERATE_CONTENT: &str = "generate_content";
pub const OP_EMBEDDINGS: &str = "embeddings";
