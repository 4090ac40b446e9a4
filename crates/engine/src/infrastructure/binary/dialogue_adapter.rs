//! Binary dialogue codec.
//!
//! On-disk layout (all ints big-endian):
//! first-prompt ID, prefix map (count + char/string pairs), prompt count,
//! then per prompt: ID, message, initial delay, final delay, next-prompt ID,
//! choice timeout, choice count, and per choice: next-prompt ID, display
//! message, chat message. Choice IDs are not stored; they are rebuilt as
//! `1..=N` from position, so choice order must be preserved exactly.
//!
//! The dialogue name is not part of the stream. It is derived from the
//! storage location, so the caller supplies it through the context
//! side-channel under the key `"name"`.

use std::collections::BTreeMap;

use dialogues_domain::{Dialogue, DialoguePrompt, InputChoice};

use super::{
    BinaryAdapter, DeserializationContext, DeserializingError, SerializationContext,
    SerializingError,
};

const CORRUPTED_HINT: &str = " (file is likely corrupted, try re-compiling)";

pub struct DialogueAdapter;

impl BinaryAdapter<Dialogue> for DialogueAdapter {
    fn read(&self, ctx: &mut DeserializationContext<'_>) -> Result<Dialogue, DeserializingError> {
        let name = ctx.data::<String>("name")?.clone();

        let first_prompt_id = ctx.read_i32()?;
        if first_prompt_id < 0 {
            return Err(DeserializingError::Corrupt(format!(
                "read invalid first prompt {first_prompt_id}{CORRUPTED_HINT}"
            )));
        }

        let prefixes: BTreeMap<char, String> = ctx.read_map()?;

        let count = ctx.read_count()?;
        let mut prompts = BTreeMap::new();
        for _ in 0..count {
            let prompt_id = ctx.read_i32()?;
            prompts.insert(prompt_id, read_prompt(prompt_id, ctx)?);
        }

        Dialogue::new(name, first_prompt_id, prompts, prefixes)
            .map_err(|e| DeserializingError::Corrupt(format!("{e}{CORRUPTED_HINT}")))
    }

    fn write(
        &self,
        dialogue: &Dialogue,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializingError> {
        ctx.write_i32(dialogue.first_prompt_id());
        ctx.write_map(dialogue.message_prefixes())?;

        let prompts = dialogue.prompts();
        ctx.write_i32(prompts.len() as i32);
        for (prompt_id, prompt) in prompts {
            ctx.write_i32(*prompt_id);
            write_prompt(prompt, ctx)?;
        }
        Ok(())
    }
}

fn read_prompt(
    prompt_id: i32,
    ctx: &mut DeserializationContext<'_>,
) -> Result<DialoguePrompt, DeserializingError> {
    let message = ctx.read_string()?;
    let initial_delay = ctx.read_i32()?;
    let final_delay = ctx.read_i32()?;
    let next_prompt_id = ctx.read_i32()?;
    let choice_timeout = ctx.read_i32()?;

    let choice_count = ctx.read_count()?;
    let mut choices = Vec::with_capacity(choice_count);
    for index in 0..choice_count {
        // Choice IDs are positional: the k-th stored choice answers to `k`.
        let choice_id = index as i32 + 1;
        let choice_next_prompt_id = ctx.read_i32()?;
        let display_message = ctx.read_string()?;
        let chat_message = ctx.read_string()?;
        choices.push(InputChoice::new(
            choice_id,
            choice_next_prompt_id,
            display_message,
            chat_message,
        ));
    }

    Ok(DialoguePrompt::new(
        prompt_id,
        message,
        next_prompt_id,
        initial_delay,
        final_delay,
        choice_timeout,
        choices,
    ))
}

fn write_prompt(
    prompt: &DialoguePrompt,
    ctx: &mut SerializationContext<'_>,
) -> Result<(), SerializingError> {
    ctx.write_string(prompt.message())?;
    ctx.write_i32(prompt.initial_delay() as i32);
    ctx.write_i32(prompt.final_delay() as i32);
    ctx.write_i32(prompt.next_prompt_id());
    ctx.write_i32(prompt.choice_timeout() as i32);

    let choices = prompt.input_choices();
    ctx.write_i32(choices.len() as i32);
    for choice in choices {
        ctx.write_i32(choice.next_prompt_id());
        ctx.write_string(choice.display_message())?;
        ctx.write_string(choice.chat_message())?;
    }
    Ok(())
}
