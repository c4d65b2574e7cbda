//! Discord permission bitfield constants.
//! Each permission is a single bit in a u64.

use lazy_static::lazy_static;

use crate::discord::{Channel, Guild, Member, OverwriteKind, PermissionOverwrite};
use crate::errors::{AppError, AppResult};

pub const CREATE_INSTANT_INVITE: u64     = 1 << 0;
pub const KICK_MEMBERS: u64              = 1 << 1;
pub const BAN_MEMBERS: u64               = 1 << 2;
pub const ADMINISTRATOR: u64             = 1 << 3;
pub const MANAGE_CHANNELS: u64           = 1 << 4;
pub const MANAGE_SERVER: u64             = 1 << 5;
pub const ADD_REACTIONS: u64             = 1 << 6;
pub const VIEW_AUDIT_LOGS: u64           = 1 << 7;
pub const VOICE_PRIORITY_SPEAKER: u64    = 1 << 8;
pub const VOICE_STREAM_VIDEO: u64        = 1 << 9;
pub const VIEW_CHANNEL: u64              = 1 << 10;
pub const SEND_MESSAGES: u64             = 1 << 11;
pub const SEND_TTS_MESSAGES: u64         = 1 << 12;
pub const MANAGE_MESSAGES: u64           = 1 << 13;
pub const EMBED_LINKS: u64               = 1 << 14;
pub const ATTACH_FILES: u64              = 1 << 15;
pub const READ_MESSAGE_HISTORY: u64      = 1 << 16;
pub const MENTION_EVERYONE: u64          = 1 << 17;
pub const USE_EXTERNAL_EMOJIS: u64       = 1 << 18;
pub const VIEW_GUILD_INSIGHTS: u64       = 1 << 19;
pub const VOICE_CONNECT: u64             = 1 << 20;
pub const VOICE_SPEAK: u64               = 1 << 21;
pub const VOICE_MUTE_MEMBERS: u64        = 1 << 22;
pub const VOICE_DEAFEN_MEMBERS: u64      = 1 << 23;
pub const VOICE_MOVE_MEMBERS: u64        = 1 << 24;
pub const VOICE_USE_VAD: u64             = 1 << 25;
pub const CHANGE_NICKNAME: u64           = 1 << 26;
pub const MANAGE_NICKNAMES: u64          = 1 << 27;
pub const MANAGE_ROLES: u64              = 1 << 28;
pub const MANAGE_WEBHOOKS: u64           = 1 << 29;
pub const MANAGE_EMOJIS: u64             = 1 << 30;
pub const USE_SLASH_COMMANDS: u64        = 1 << 31;
pub const VOICE_REQUEST_TO_SPEAK: u64    = 1 << 32;
pub const MANAGE_EVENTS: u64             = 1 << 33;
pub const MANAGE_THREADS: u64            = 1 << 34;
pub const CREATE_PUBLIC_THREADS: u64     = 1 << 35;
pub const CREATE_PRIVATE_THREADS: u64    = 1 << 36;
pub const USE_EXTERNAL_STICKERS: u64     = 1 << 37;
pub const SEND_MESSAGES_IN_THREADS: u64  = 1 << 38;
pub const USE_ACTIVITIES: u64            = 1 << 39;
pub const MODERATE_MEMBERS: u64          = 1 << 40;

/// Every bit set. Owners and administrators resolve to this.
pub const ALL_PERMISSIONS: u64 = u64::MAX;

/// Guild-scope permissions, in entitlement order.
pub const GUILD_PERMISSIONS: &[u64] = &[
    MANAGE_EVENTS,
    MANAGE_EMOJIS,
    MANAGE_NICKNAMES,
    CHANGE_NICKNAME,
    MANAGE_ROLES,
    CREATE_INSTANT_INVITE,
    KICK_MEMBERS,
    BAN_MEMBERS,
    ADMINISTRATOR,
    MANAGE_CHANNELS,
    MANAGE_SERVER,
    ADD_REACTIONS,
    VIEW_AUDIT_LOGS,
    VIEW_CHANNEL,
    VIEW_GUILD_INSIGHTS,
    MODERATE_MEMBERS,
];

pub const TEXT_CHANNEL_PERMISSIONS: &[u64] = &[
    SEND_MESSAGES,
    SEND_TTS_MESSAGES,
    MANAGE_MESSAGES,
    EMBED_LINKS,
    ATTACH_FILES,
    READ_MESSAGE_HISTORY,
    MENTION_EVERYONE,
    USE_EXTERNAL_EMOJIS,
    USE_SLASH_COMMANDS,
    MANAGE_THREADS,
    CREATE_PUBLIC_THREADS,
    CREATE_PRIVATE_THREADS,
    USE_EXTERNAL_STICKERS,
    SEND_MESSAGES_IN_THREADS,
    USE_ACTIVITIES,
    MANAGE_WEBHOOKS,
];

pub const VOICE_CHANNEL_PERMISSIONS: &[u64] = &[
    VOICE_PRIORITY_SPEAKER,
    VOICE_STREAM_VIDEO,
    VOICE_CONNECT,
    VOICE_SPEAK,
    VOICE_MUTE_MEMBERS,
    VOICE_DEAFEN_MEMBERS,
    VOICE_MOVE_MEMBERS,
    VOICE_USE_VAD,
    VOICE_REQUEST_TO_SPEAK,
];

lazy_static! {
    /// Text permissions followed by voice permissions.
    pub static ref CHANNEL_PERMISSIONS: Vec<u64> = TEXT_CHANNEL_PERMISSIONS
        .iter()
        .chain(VOICE_CHANNEL_PERMISSIONS)
        .copied()
        .collect();

    /// Channel permissions followed by guild permissions, first occurrence wins.
    pub static ref ROLE_PERMISSIONS: Vec<u64> = {
        let mut perms: Vec<u64> = Vec::new();
        for &perm in CHANNEL_PERMISSIONS.iter().chain(GUILD_PERMISSIONS) {
            if !perms.contains(&perm) {
                perms.push(perm);
            }
        }
        perms
    };
}

/// Stable symbolic name of a single permission bit.
pub fn permission_name(permission: u64) -> Option<&'static str> {
    let name = match permission {
        ADMINISTRATOR => "Administrator",
        SEND_MESSAGES => "SendMessages",
        SEND_TTS_MESSAGES => "SendTTSMessages",
        MANAGE_MESSAGES => "ManageMessages",
        EMBED_LINKS => "EmbedLinks",
        ATTACH_FILES => "AttachFiles",
        READ_MESSAGE_HISTORY => "ReadMessageHistory",
        MENTION_EVERYONE => "MentionEveryone",
        USE_EXTERNAL_EMOJIS => "UseExternalEmojis",
        USE_SLASH_COMMANDS => "UseSlashCommands",
        MANAGE_THREADS => "ManageThreads",
        CREATE_PUBLIC_THREADS => "CreatePublicThreads",
        CREATE_PRIVATE_THREADS => "CreatePrivateThreads",
        USE_EXTERNAL_STICKERS => "UseExternalStickers",
        SEND_MESSAGES_IN_THREADS => "SendMessagesInThreads",
        VOICE_PRIORITY_SPEAKER => "VoicePrioritySpeaker",
        VOICE_STREAM_VIDEO => "VoiceStreamVideo",
        VOICE_CONNECT => "VoiceConnect",
        VOICE_SPEAK => "VoiceSpeak",
        VOICE_MUTE_MEMBERS => "VoiceMuteMembers",
        VOICE_DEAFEN_MEMBERS => "VoiceDeafenMembers",
        VOICE_MOVE_MEMBERS => "VoiceMoveMembers",
        VOICE_USE_VAD => "VoiceUseVAD",
        VOICE_REQUEST_TO_SPEAK => "VoiceRequestToSpeak",
        USE_ACTIVITIES => "UseActivities",
        MANAGE_WEBHOOKS => "ManageWebhooks",
        MANAGE_EVENTS => "ManageEvents",
        MANAGE_EMOJIS => "ManageEmojis",
        MANAGE_NICKNAMES => "ManageNicknames",
        CHANGE_NICKNAME => "ChangeNickname",
        MANAGE_ROLES => "ManageRoles",
        CREATE_INSTANT_INVITE => "CreateInstantInvite",
        KICK_MEMBERS => "KickMembers",
        BAN_MEMBERS => "BanMembers",
        MANAGE_CHANNELS => "ManageChannels",
        MANAGE_SERVER => "ManageServer",
        ADD_REACTIONS => "AddReactions",
        VIEW_AUDIT_LOGS => "ViewAuditLogs",
        VIEW_CHANNEL => "ViewChannel",
        VIEW_GUILD_INSIGHTS => "ViewGuildInsights",
        MODERATE_MEMBERS => "ModerateMembers",
        _ => return None,
    };
    Some(name)
}

/// Like [`permission_name`], but a bit outside the table is an error.
pub fn name_of(permission: u64) -> AppResult<&'static str> {
    permission_name(permission).ok_or(AppError::UnknownPermission(permission))
}

/// Check if a permission bitfield has a specific permission.
#[inline]
pub fn has_permission(permissions: u64, required: u64) -> bool {
    permissions & required == required
}

/// The bits of `table` that are set in `permissions`, in table order.
/// Bits outside the table are ignored.
pub fn decode<'a>(permissions: u64, table: &'a [u64]) -> impl Iterator<Item = u64> + 'a {
    table
        .iter()
        .copied()
        .filter(move |&perm| has_permission(permissions, perm))
}

/// Compute a member's effective guild-level permissions.
///
/// Algorithm: start with @everyone base -> OR all member's role permissions -> ADMIN check.
/// If the user is the guild owner, return all permissions.
pub fn compute_base_permissions(
    is_owner: bool,
    everyone_perms: u64,
    member_role_perms: &[u64],
) -> u64 {
    if is_owner {
        return ALL_PERMISSIONS;
    }

    let mut perms = everyone_perms;
    for &role_perms in member_role_perms {
        perms |= role_perms;
    }

    if perms & ADMINISTRATOR != 0 {
        return ALL_PERMISSIONS;
    }

    perms
}

/// Apply channel-level overwrites to a base permission set.
///
/// Process: base perms -> apply @everyone overwrite -> apply role overwrites -> apply member overwrite.
/// ADMINISTRATOR bypasses all overwrites. The @everyone role shares the guild's id.
pub fn apply_channel_overwrites(
    base_perms: u64,
    overwrites: &[PermissionOverwrite],
    member_role_ids: &[String],
    user_id: &str,
    everyone_role_id: &str,
) -> u64 {
    if base_perms & ADMINISTRATOR != 0 {
        return ALL_PERMISSIONS;
    }

    let mut perms = base_perms;

    // 1. @everyone
    for overwrite in overwrites {
        if overwrite.kind == OverwriteKind::Role && overwrite.id == everyone_role_id {
            perms &= !overwrite.deny;
            perms |= overwrite.allow;
        }
    }

    // 2. Member's roles, aggregated
    let mut role_allow: u64 = 0;
    let mut role_deny: u64 = 0;
    for overwrite in overwrites {
        if overwrite.kind == OverwriteKind::Role
            && overwrite.id != everyone_role_id
            && member_role_ids.contains(&overwrite.id)
        {
            role_allow |= overwrite.allow;
            role_deny |= overwrite.deny;
        }
    }
    perms &= !role_deny;
    perms |= role_allow;

    // 3. The member
    for overwrite in overwrites {
        if overwrite.kind == OverwriteKind::Member && overwrite.id == user_id {
            perms &= !overwrite.deny;
            perms |= overwrite.allow;
        }
    }

    perms
}

/// Effective permissions of `member` in `channel`, the way Discord resolves them.
/// `guild` must carry its role list.
pub fn compute_channel_permissions(guild: &Guild, member: &Member, channel: &Channel) -> u64 {
    let is_owner = guild.owner_id.as_deref() == Some(member.user.id.as_str());

    let everyone_perms = guild
        .roles
        .iter()
        .find(|role| role.id == guild.id)
        .map(|role| role.permissions)
        .unwrap_or(0);

    let member_role_perms: Vec<u64> = guild
        .roles
        .iter()
        .filter(|role| member.roles.contains(&role.id))
        .map(|role| role.permissions)
        .collect();

    let base = compute_base_permissions(is_owner, everyone_perms, &member_role_perms);
    apply_channel_overwrites(
        base,
        &channel.permission_overwrites,
        &member.roles,
        &member.user.id,
        &guild.id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn overwrite(kind: OverwriteKind, id: &str, allow: u64, deny: u64) -> PermissionOverwrite {
        PermissionOverwrite {
            id: id.into(),
            kind,
            allow,
            deny,
        }
    }

    #[test]
    fn every_listed_bit_has_a_unique_name() {
        let mut names = HashSet::new();
        for &perm in GUILD_PERMISSIONS.iter().chain(CHANNEL_PERMISSIONS.iter()) {
            assert_eq!(perm.count_ones(), 1, "{perm:#x} is not a single bit");
            assert!(names.insert(name_of(perm).unwrap()));
        }
        assert_eq!(names.len(), GUILD_PERMISSIONS.len() + CHANNEL_PERMISSIONS.len());
    }

    #[test]
    fn unlisted_bit_has_no_name() {
        assert!(permission_name(1 << 50).is_none());
        assert!(matches!(name_of(1 << 50), Err(AppError::UnknownPermission(_))));
    }

    #[test]
    fn channel_permissions_are_text_then_voice() {
        assert_eq!(CHANNEL_PERMISSIONS.len(), 25);
        assert_eq!(CHANNEL_PERMISSIONS[0], SEND_MESSAGES);
        assert_eq!(CHANNEL_PERMISSIONS[16], VOICE_PRIORITY_SPEAKER);
        assert_eq!(ROLE_PERMISSIONS.len(), 41);
    }

    #[test]
    fn decode_keeps_table_order_and_ignores_unknown_bits() {
        let mask = MANAGE_MESSAGES | SEND_MESSAGES | (1 << 55) | VOICE_SPEAK;
        let decoded: Vec<u64> = decode(mask, TEXT_CHANNEL_PERMISSIONS).collect();
        assert_eq!(decoded, vec![SEND_MESSAGES, MANAGE_MESSAGES]);
    }

    #[test]
    fn decoded_bits_never_exceed_the_mask() {
        for mask in [0u64, 1, 0xdead_beef, u64::MAX, SEND_MESSAGES | KICK_MEMBERS] {
            let reencoded = decode(mask, &ROLE_PERMISSIONS).fold(0, |acc, p| acc | p);
            let table_mask = ROLE_PERMISSIONS.iter().fold(0, |acc, p| acc | p);
            assert_eq!(reencoded, mask & table_mask);
        }
    }

    #[test]
    fn owner_has_everything() {
        assert_eq!(compute_base_permissions(true, 0, &[]), ALL_PERMISSIONS);
    }

    #[test]
    fn administrator_role_grants_everything() {
        assert_eq!(
            compute_base_permissions(false, VIEW_CHANNEL, &[ADMINISTRATOR]),
            ALL_PERMISSIONS
        );
    }

    #[test]
    fn base_permissions_or_roles() {
        let perms = compute_base_permissions(false, VIEW_CHANNEL, &[SEND_MESSAGES, KICK_MEMBERS]);
        assert_eq!(perms, VIEW_CHANNEL | SEND_MESSAGES | KICK_MEMBERS);
    }

    #[test]
    fn overwrites_apply_everyone_then_roles_then_member() {
        let base = VIEW_CHANNEL | SEND_MESSAGES;
        let overwrites = vec![
            overwrite(OverwriteKind::Role, "guild", 0, SEND_MESSAGES),
            overwrite(OverwriteKind::Role, "mods", MANAGE_MESSAGES | SEND_MESSAGES, 0),
            overwrite(OverwriteKind::Role, "muted", 0, SEND_MESSAGES),
            overwrite(OverwriteKind::Member, "alice", EMBED_LINKS, VIEW_CHANNEL),
        ];

        let mods = vec!["mods".to_string()];
        let perms = apply_channel_overwrites(base, &overwrites, &mods, "bob", "guild");
        assert_eq!(perms, VIEW_CHANNEL | SEND_MESSAGES | MANAGE_MESSAGES);

        // Role allow wins over role deny at the same level
        let both = vec!["mods".to_string(), "muted".to_string()];
        let perms = apply_channel_overwrites(base, &overwrites, &both, "bob", "guild");
        assert_eq!(perms, VIEW_CHANNEL | SEND_MESSAGES | MANAGE_MESSAGES);

        let perms = apply_channel_overwrites(base, &overwrites, &[], "alice", "guild");
        assert_eq!(perms, EMBED_LINKS);
    }

    #[test]
    fn channel_permissions_fold_roles_and_overwrites() {
        use crate::discord::{ChannelKind, Role, User};

        let guild = Guild {
            id: "g".into(),
            name: "Guild".into(),
            description: None,
            owner_id: Some("owner".into()),
            rules_channel_id: None,
            roles: vec![
                Role { id: "g".into(), name: "@everyone".into(), permissions: VIEW_CHANNEL | SEND_MESSAGES, position: 0 },
                Role { id: "mods".into(), name: "mods".into(), permissions: KICK_MEMBERS, position: 1 },
            ],
        };
        let channel = Channel {
            id: "c".into(),
            guild_id: Some("g".into()),
            kind: ChannelKind::Text,
            name: "general".into(),
            topic: None,
            position: 0,
            member_count: None,
            permission_overwrites: vec![
                overwrite(OverwriteKind::Role, "g", 0, SEND_MESSAGES),
                overwrite(OverwriteKind::Role, "mods", MANAGE_MESSAGES | SEND_MESSAGES, 0),
            ],
        };
        let member = |id: &str, roles: Vec<String>| Member {
            user: User { id: id.into(), username: id.into(), bot: false },
            nick: None,
            roles,
        };

        let plain = compute_channel_permissions(&guild, &member("u1", vec![]), &channel);
        assert_eq!(plain, VIEW_CHANNEL);

        let moderator = compute_channel_permissions(&guild, &member("u2", vec!["mods".into()]), &channel);
        assert_eq!(moderator, VIEW_CHANNEL | SEND_MESSAGES | MANAGE_MESSAGES | KICK_MEMBERS);

        let owner = compute_channel_permissions(&guild, &member("owner", vec![]), &channel);
        assert_eq!(owner, ALL_PERMISSIONS);
    }

    #[test]
    fn administrator_bypasses_overwrites() {
        let overwrites = vec![overwrite(OverwriteKind::Role, "guild", 0, u64::MAX)];
        let perms = apply_channel_overwrites(ADMINISTRATOR, &overwrites, &[], "u", "guild");
        assert_eq!(perms, ALL_PERMISSIONS);
    }
}
