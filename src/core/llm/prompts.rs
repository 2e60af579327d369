/// System message for flow analysis
pub const SYSTEM_PROMPT: &str = "You are a software architect who reads source code and extracts its linear \
execution flow as a flowchart. You answer with a single JSON object and nothing else.";

/// Build the user message for one entrypoint
pub fn build_analysis_prompt(code_context: &str, entrypoint: &str) -> String {
    format!(
        r#"# Task: execution flow analysis

Follow the execution of `{entrypoint}` step by step and describe it as a flowchart.

## Code

{code_context}

## Step kinds

- "start": where the flow begins (request received, function entered)
- "process": computation or transformation
- "decision": a branch point (if/else, match, validation, try/except)
- "data": reading or writing data (database, file, HTTP call)
- "end": normal completion (return, response sent)
- "error": failure path (exception raised, error response)

## Rules

1. The first step is a "start" step.
2. Every sequence ends with an "end" or "error" step, or with a "decision" whose branches all end that way.
3. Only "decision" steps have "branches". A decision has at least two branches.
4. Each branch has a short "label" (for example "yes", "no", "not found") and its own "steps".
5. Step ids are unique across the whole answer and contain only letters, digits and underscores.
6. Labels are short (under 40 characters); put explanations in "detail".

## Answer format

{{
  "summary": "One or two sentences about what the flow does",
  "steps": [
    {{"id": "start", "kind": "start", "label": "Receive order_id"}},
    {{"id": "load_order", "kind": "data", "label": "Load order", "detail": "get_order(order_id)"}},
    {{"id": "order_exists", "kind": "decision", "label": "Order exists?", "branches": [
      {{"label": "yes", "steps": [
        {{"id": "total", "kind": "process", "label": "Compute total"}},
        {{"id": "done", "kind": "end", "label": "Return total"}}
      ]}},
      {{"label": "no", "steps": [
        {{"id": "not_found", "kind": "error", "label": "Raise OrderNotFound"}}
      ]}}
    ]}}
  ],
  "data_formats": [
    {{"name": "Order", "description": "Persisted order record", "fields": ["id", "items", "total"]}}
  ]
}}
"#
    )
}
