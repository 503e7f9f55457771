//! Commands for the Wand context.

use std::collections::BTreeMap;

use uuid::Uuid;
use wandcraft_core::command::Command;

use super::lost::WorldPosition;
use super::ports::WandOwner;

/// Implements `Command` for a struct carrying `correlation_id` and the
/// targeted `wand_id`.
macro_rules! wand_command {
    ($($name:ident => $command_type:literal),+ $(,)?) => {
        $(
            impl Command for $name {
                fn command_type(&self) -> &'static str {
                    $command_type
                }

                fn correlation_id(&self) -> Uuid {
                    self.correlation_id
                }

                fn target_id(&self) -> Uuid {
                    self.wand_id
                }
            }
        )+
    };
}

/// Command to create a wand from a template.
#[derive(Debug, Clone)]
pub struct CreateWand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Identifier for the new wand.
    pub wand_id: Uuid,
    /// Template to create it from.
    pub template_key: String,
}

/// Command to copy a wand under a new identifier.
#[derive(Debug, Clone)]
pub struct DuplicateWand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand to copy.
    pub wand_id: Uuid,
    /// Identifier for the copy.
    pub new_wand_id: Uuid,
}

/// Command to bind a spell. `spell` may carry a level suffix (`fire|2`).
#[derive(Debug, Clone)]
pub struct AddSpell {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub spell: String,
}

/// Command to unbind a spell.
#[derive(Debug, Clone)]
pub struct RemoveSpell {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub spell: String,
}

/// Command to bind a brush.
#[derive(Debug, Clone)]
pub struct AddBrush {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub brush: String,
}

/// Command to unbind a brush.
#[derive(Debug, Clone)]
pub struct RemoveBrush {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub brush: String,
}

/// Command to select (or clear, with `None`) the active spell.
#[derive(Debug, Clone)]
pub struct SetActiveSpell {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub spell: Option<String>,
}

/// Command to select (or clear, with `None`) the active brush.
#[derive(Debug, Clone)]
pub struct SetActiveBrush {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub brush: Option<String>,
}

/// Command to cast a spell. `None` casts the active spell.
#[derive(Debug, Clone)]
pub struct CastSpell {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub spell: Option<String>,
}

/// Command to regenerate mana for elapsed ticks.
#[derive(Debug, Clone)]
pub struct RegenerateMana {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub elapsed_ticks: u32,
}

/// Command to charge mana outside of a cast.
#[derive(Debug, Clone)]
pub struct ChargeMana {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub amount: f32,
}

/// Command to try advancing one tier along the wand's upgrade path.
#[derive(Debug, Clone)]
pub struct CheckAndUpgrade {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    /// Suppress the owner notification.
    pub quiet: bool,
}

/// Command to merge another wand's bindings into this one.
#[derive(Debug, Clone)]
pub struct MergeWands {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand that absorbs bindings.
    pub wand_id: Uuid,
    /// The wand bindings are taken from.
    pub source_id: Uuid,
    /// Delete the source once the merge succeeded.
    pub consume_source: bool,
}

/// Command to set a property override from its raw string form.
#[derive(Debug, Clone)]
pub struct SetOverride {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub property: String,
    pub value: String,
}

/// Command to remove a property override.
#[derive(Debug, Clone)]
pub struct RemoveOverride {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub property: String,
}

/// Command to lock or unlock a wand.
#[derive(Debug, Clone)]
pub struct SetLocked {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub locked: bool,
}

/// Command to bind a wand to an owner.
#[derive(Debug, Clone)]
pub struct BindOwner {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub owner: WandOwner,
}

/// Command to release a wand's owner binding.
#[derive(Debug, Clone)]
pub struct UnbindOwner {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
}

/// Command to bind every catalog spell up to a level.
#[derive(Debug, Clone)]
pub struct FillSpells {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub max_level: u32,
}

/// Command to edit instance properties by name.
#[derive(Debug, Clone)]
pub struct ConfigureWand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    /// Raw values keyed by property name.
    pub properties: BTreeMap<String, String>,
    /// Only raise numbers and turn flags on.
    pub upgrade_only: bool,
}

/// Command to add enchant levels.
#[derive(Debug, Clone)]
pub struct EnchantWand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub levels: u64,
    /// Allow drawing a spell from the next tier's optional pool.
    pub add_spells: bool,
}

/// Command to reset a wand to its first tier.
#[derive(Debug, Clone)]
pub struct UnenchantWand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
}

/// Command to move a wand onto another upgrade path.
#[derive(Debug, Clone)]
pub struct SetPath {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub path: String,
}

/// Command to add to a wand's damage counter.
#[derive(Debug, Clone)]
pub struct RecordDamage {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    pub amount: f64,
}

/// Command to record that a wand's physical item was lost.
#[derive(Debug, Clone)]
pub struct MarkWandLost {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
    /// Where the item was last seen.
    pub position: WorldPosition,
}

/// Command to clear the lost record of a wand that turned up again.
#[derive(Debug, Clone)]
pub struct ReconcileFoundWand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The wand identifier.
    pub wand_id: Uuid,
}

wand_command! {
    CreateWand => "wand.create",
    DuplicateWand => "wand.duplicate",
    AddSpell => "wand.add_spell",
    RemoveSpell => "wand.remove_spell",
    AddBrush => "wand.add_brush",
    RemoveBrush => "wand.remove_brush",
    SetActiveSpell => "wand.set_active_spell",
    SetActiveBrush => "wand.set_active_brush",
    CastSpell => "wand.cast_spell",
    RegenerateMana => "wand.regenerate_mana",
    ChargeMana => "wand.charge_mana",
    CheckAndUpgrade => "wand.check_and_upgrade",
    MergeWands => "wand.merge",
    SetOverride => "wand.set_override",
    RemoveOverride => "wand.remove_override",
    SetLocked => "wand.set_locked",
    BindOwner => "wand.bind_owner",
    UnbindOwner => "wand.unbind_owner",
    FillSpells => "wand.fill_spells",
    ConfigureWand => "wand.configure",
    EnchantWand => "wand.enchant",
    UnenchantWand => "wand.unenchant",
    SetPath => "wand.set_path",
    RecordDamage => "wand.record_damage",
    MarkWandLost => "wand.mark_lost",
    ReconcileFoundWand => "wand.reconcile_found",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_targets_the_wand() {
        let wand_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let command = MergeWands {
            correlation_id,
            wand_id,
            source_id: Uuid::new_v4(),
            consume_source: false,
        };

        assert_eq!(command.command_type(), "wand.merge");
        assert_eq!(command.target_id(), wand_id);
        assert_eq!(command.correlation_id(), correlation_id);
    }
}
