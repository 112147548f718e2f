//! In-memory cloud used by reconciler tests
//!
//! `FakeCloud` keeps an organization tree, account tags, IAM policies, roles
//! and attachments in memory and enforces the same conflict / not-found /
//! delete-conflict rules the real APIs do. Every call is appended to a call
//! log so tests can assert which provider operations a pass performed.

use crate::error::{CloudError, Result, codes};
use crate::provider::{ClientBuilder, CloudClient, IamApi, OrganizationsApi, StsApi};
use crate::types::{
    CallerIdentity, CreateAccountState, CreateAccountStatus, Page, Parent, ParentKind,
    PolicyScope, PolicySummary, RoleSummary, SecretRef, SessionCredentials, Tag,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const FAKE_ACCOUNT_ID: &str = "111111111111";

#[derive(Debug, Clone)]
struct StoredPolicy {
    arn: String,
    #[allow(dead_code)]
    document: String,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<CloudError>>,

    // organizations
    next_request: u32,
    create_requests: HashMap<String, CreateAccountStatus>,
    describe_override: Option<(CreateAccountState, Option<String>)>,
    tags: HashMap<String, Vec<Tag>>,
    parents: HashMap<String, Vec<Parent>>,

    // iam
    local_policies: BTreeMap<String, StoredPolicy>,
    managed_policies: BTreeSet<String>,
    roles: BTreeMap<String, String>,
    attachments: BTreeMap<String, Vec<String>>,
    page_size: usize,

    // sts
    caller_account: String,
    denied_roles: Vec<String>,
    assumed_roles: Vec<String>,
}

/// In-memory implementation of every provider API
#[derive(Debug, Clone)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        let state = State {
            page_size: 2,
            caller_account: FAKE_ACCOUNT_ID.to_string(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and pop an injected failure for `op`, if any.
    fn enter(&self, op: &str, detail: &str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        if detail.is_empty() {
            state.calls.push(op.to_string());
        } else {
            state.calls.push(format!("{} {}", op, detail));
        }
        if let Some(err) = state.failures.get_mut(op).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        Ok(state)
    }

    // ---- test setup ----

    /// Make the next call to `op` (e.g. `"CreatePolicy"`) fail with `err`.
    pub fn fail_next(&self, op: &str, err: CloudError) {
        self.lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = size.max(1);
    }

    pub fn set_caller_account(&self, account: &str) {
        self.lock().caller_account = account.to_string();
    }

    /// Force the outcome reported by `DescribeCreateAccountStatus`.
    pub fn set_create_account_outcome(&self, state: CreateAccountState, reason: Option<&str>) {
        self.lock().describe_override = Some((state, reason.map(str::to_string)));
    }

    pub fn set_parents(&self, child_id: &str, parents: &[&str]) {
        let parents = parents
            .iter()
            .map(|id| Parent {
                id: id.to_string(),
                kind: if id.starts_with("r-") {
                    ParentKind::Root
                } else {
                    ParentKind::OrganizationalUnit
                },
            })
            .collect();
        self.lock().parents.insert(child_id.to_string(), parents);
    }

    pub fn set_tags(&self, resource_id: &str, tags: Vec<Tag>) {
        self.lock().tags.insert(resource_id.to_string(), tags);
    }

    pub fn add_managed_policy(&self, name: &str) {
        self.lock().managed_policies.insert(name.to_string());
    }

    /// Make `AssumeRole` fail for any role ARN containing `pattern`.
    pub fn deny_assume_role(&self, pattern: &str) {
        self.lock().denied_roles.push(pattern.to_string());
    }

    /// Seed a customer managed policy without going through `CreatePolicy`.
    pub fn seed_policy(&self, name: &str) {
        let mut state = self.lock();
        let arn = format!("arn:aws:iam::{}:policy/{}", state.caller_account, name);
        state.local_policies.insert(
            name.to_string(),
            StoredPolicy {
                arn,
                document: "{}".to_string(),
            },
        );
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls whose operation name equals `op`
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn local_policy_names(&self) -> Vec<String> {
        self.lock().local_policies.keys().cloned().collect()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.lock().roles.keys().cloned().collect()
    }

    pub fn attached_policy_arns(&self, role_name: &str) -> Vec<String> {
        self.lock()
            .attachments
            .get(role_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn trust_policy(&self, role_name: &str) -> Option<String> {
        self.lock().roles.get(role_name).cloned()
    }

    pub fn tags_of(&self, resource_id: &str) -> Vec<Tag> {
        self.lock()
            .tags
            .get(resource_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn parents_of(&self, child_id: &str) -> Vec<String> {
        self.lock()
            .parents
            .get(child_id)
            .map(|p| p.iter().map(|p| p.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn assumed_roles(&self) -> Vec<String> {
        self.lock().assumed_roles.clone()
    }
}

fn paged<T: Clone>(items: &[T], marker: Option<&str>, page_size: usize) -> Result<Page<T>> {
    let start = match marker {
        Some(m) => m
            .parse::<usize>()
            .map_err(|_| CloudError::InvalidRequest(format!("bad marker {}", m)))?,
        None => 0,
    };
    let end = (start + page_size).min(items.len());
    let slice = items.get(start..end).unwrap_or_default().to_vec();
    let next_marker = (end < items.len()).then(|| end.to_string());
    Ok(Page {
        items: slice,
        next_marker,
    })
}

fn no_such_entity(what: &str) -> CloudError {
    CloudError::api(codes::NO_SUCH_ENTITY, format!("{} cannot be found", what))
}

#[async_trait]
impl OrganizationsApi for FakeCloud {
    async fn create_account(&self, name: &str, email: &str) -> Result<CreateAccountStatus> {
        let mut state = self.enter("CreateAccount", name)?;
        if email.is_empty() {
            return Err(CloudError::api(
                "InvalidInputException",
                "email must not be empty",
            ));
        }
        state.next_request += 1;
        let request_id = format!("car-{:08}", state.next_request);
        let status = CreateAccountStatus::in_progress(request_id.clone());
        state.create_requests.insert(request_id, status.clone());
        Ok(status)
    }

    async fn describe_create_account_status(
        &self,
        request_id: &str,
    ) -> Result<CreateAccountStatus> {
        let state = self.enter("DescribeCreateAccountStatus", request_id)?;
        if !state.create_requests.contains_key(request_id) {
            return Err(CloudError::api(
                "CreateAccountStatusNotFoundException",
                format!("request {} not found", request_id),
            ));
        }
        let status = match &state.describe_override {
            Some((CreateAccountState::Failed, reason)) => CreateAccountStatus::failed(
                request_id,
                reason.clone().unwrap_or_else(|| "INTERNAL_FAILURE".to_string()),
            ),
            Some((CreateAccountState::InProgress, _)) => {
                CreateAccountStatus::in_progress(request_id)
            }
            _ => {
                let suffix = request_id.trim_start_matches("car-");
                CreateAccountStatus::succeeded(request_id, format!("2000{}", suffix))
            }
        };
        Ok(status)
    }

    async fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> Result<()> {
        let mut state = self.enter("TagResource", resource_id)?;
        let existing = state.tags.entry(resource_id.to_string()).or_default();
        for tag in tags {
            existing.retain(|t| t.key != tag.key);
            existing.push(tag.clone());
        }
        Ok(())
    }

    async fn untag_resource(&self, resource_id: &str, keys: &[String]) -> Result<()> {
        let mut state = self.enter("UntagResource", resource_id)?;
        if let Some(existing) = state.tags.get_mut(resource_id) {
            existing.retain(|t| !keys.contains(&t.key));
        }
        Ok(())
    }

    async fn list_tags_for_resource(&self, resource_id: &str) -> Result<Vec<Tag>> {
        let state = self.enter("ListTagsForResource", resource_id)?;
        Ok(state.tags.get(resource_id).cloned().unwrap_or_default())
    }

    async fn list_parents(&self, child_id: &str) -> Result<Vec<Parent>> {
        let state = self.enter("ListParents", child_id)?;
        Ok(state.parents.get(child_id).cloned().unwrap_or_default())
    }

    async fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> Result<()> {
        let mut state = self.enter(
            "MoveAccount",
            &format!("{} {}->{}", account_id, source_parent_id, destination_parent_id),
        )?;
        let current = state.parents.get(account_id).cloned().unwrap_or_default();
        if !current.iter().any(|p| p.id == source_parent_id) {
            return Err(CloudError::api(
                "SourceParentNotFoundException",
                format!("{} is not a parent of {}", source_parent_id, account_id),
            ));
        }
        state.parents.insert(
            account_id.to_string(),
            vec![Parent {
                id: destination_parent_id.to_string(),
                kind: ParentKind::OrganizationalUnit,
            }],
        );
        Ok(())
    }
}

#[async_trait]
impl IamApi for FakeCloud {
    async fn create_policy(
        &self,
        name: &str,
        _description: &str,
        document: &str,
    ) -> Result<PolicySummary> {
        let mut state = self.enter("CreatePolicy", name)?;
        if state.local_policies.contains_key(name) {
            return Err(CloudError::api(
                codes::ENTITY_ALREADY_EXISTS,
                format!("A policy called {} already exists", name),
            ));
        }
        let parsed: serde_json::Value = serde_json::from_str(document).map_err(|e| {
            CloudError::api(codes::MALFORMED_POLICY_DOCUMENT, format!("{}", e))
        })?;
        let has_statements = parsed
            .get("Statement")
            .and_then(|s| s.as_array())
            .is_some_and(|s| !s.is_empty());
        if !has_statements {
            return Err(CloudError::api(
                codes::MALFORMED_POLICY_DOCUMENT,
                "Syntax errors in policy.",
            ));
        }
        let arn = format!("arn:aws:iam::{}:policy/{}", state.caller_account, name);
        state.local_policies.insert(
            name.to_string(),
            StoredPolicy {
                arn: arn.clone(),
                document: document.to_string(),
            },
        );
        Ok(PolicySummary::new(name, arn))
    }

    async fn delete_policy(&self, policy_arn: &str) -> Result<()> {
        let mut state = self.enter("DeletePolicy", policy_arn)?;
        let name = state
            .local_policies
            .iter()
            .find(|(_, p)| p.arn == policy_arn)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| no_such_entity(&format!("Policy {}", policy_arn)))?;
        if state
            .attachments
            .values()
            .any(|arns| arns.iter().any(|a| a == policy_arn))
        {
            return Err(CloudError::api(
                "DeleteConflict",
                "Cannot delete a policy attached to entities.",
            ));
        }
        state.local_policies.remove(&name);
        Ok(())
    }

    async fn list_policies(
        &self,
        scope: PolicyScope,
        marker: Option<&str>,
    ) -> Result<Page<PolicySummary>> {
        let state = self.enter("ListPolicies", marker.unwrap_or(""))?;
        let mut all = Vec::new();
        if matches!(scope, PolicyScope::All | PolicyScope::Aws) {
            all.extend(
                state
                    .managed_policies
                    .iter()
                    .map(|n| PolicySummary::new(n, format!("arn:aws:iam::aws:policy/{}", n))),
            );
        }
        if matches!(scope, PolicyScope::All | PolicyScope::Local) {
            all.extend(
                state
                    .local_policies
                    .iter()
                    .map(|(n, p)| PolicySummary::new(n, p.arn.clone())),
            );
        }
        paged(&all, marker, state.page_size)
    }

    async fn create_role(
        &self,
        name: &str,
        _description: &str,
        trust_policy: &str,
    ) -> Result<RoleSummary> {
        let mut state = self.enter("CreateRole", name)?;
        if state.roles.contains_key(name) {
            return Err(CloudError::api(
                codes::ENTITY_ALREADY_EXISTS,
                format!("Role with name {} already exists.", name),
            ));
        }
        state
            .roles
            .insert(name.to_string(), trust_policy.to_string());
        Ok(RoleSummary {
            name: name.to_string(),
            arn: format!("arn:aws:iam::{}:role/{}", state.caller_account, name),
        })
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        let mut state = self.enter("DeleteRole", name)?;
        if !state.roles.contains_key(name) {
            return Err(no_such_entity(&format!("The role with name {}", name)));
        }
        if state.attachments.get(name).is_some_and(|a| !a.is_empty()) {
            return Err(CloudError::api(
                "DeleteConflict",
                "Cannot delete entity, must detach all policies first.",
            ));
        }
        state.roles.remove(name);
        state.attachments.remove(name);
        Ok(())
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.enter("AttachRolePolicy", &format!("{} {}", role_name, policy_arn))?;
        if !state.roles.contains_key(role_name) {
            return Err(no_such_entity(&format!("The role with name {}", role_name)));
        }
        let known = state.local_policies.values().any(|p| p.arn == policy_arn)
            || state
                .managed_policies
                .iter()
                .any(|n| policy_arn.ends_with(&format!(":aws:policy/{}", n)));
        if !known {
            return Err(no_such_entity(&format!("Policy {}", policy_arn)));
        }
        let attached = state.attachments.entry(role_name.to_string()).or_default();
        if !attached.iter().any(|a| a == policy_arn) {
            attached.push(policy_arn.to_string());
        }
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.enter("DetachRolePolicy", &format!("{} {}", role_name, policy_arn))?;
        if !state.roles.contains_key(role_name) {
            return Err(no_such_entity(&format!("The role with name {}", role_name)));
        }
        let attached = state.attachments.entry(role_name.to_string()).or_default();
        let before = attached.len();
        attached.retain(|a| a != policy_arn);
        if attached.len() == before {
            return Err(no_such_entity(&format!("Policy {} attachment", policy_arn)));
        }
        Ok(())
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
        marker: Option<&str>,
    ) -> Result<Page<PolicySummary>> {
        let state = self.enter("ListAttachedRolePolicies", role_name)?;
        if !state.roles.contains_key(role_name) {
            return Err(no_such_entity(&format!("The role with name {}", role_name)));
        }
        let attached: Vec<PolicySummary> = state
            .attachments
            .get(role_name)
            .map(|arns| {
                arns.iter()
                    .map(|arn| {
                        let name = arn.rsplit('/').next().unwrap_or(arn);
                        PolicySummary::new(name, arn.clone())
                    })
                    .collect()
            })
            .unwrap_or_default();
        paged(&attached, marker, state.page_size)
    }
}

#[async_trait]
impl StsApi for FakeCloud {
    async fn assume_role(
        &self,
        role_arn: &str,
        _session_name: &str,
    ) -> Result<SessionCredentials> {
        let mut state = self.enter("AssumeRole", role_arn)?;
        if state.denied_roles.iter().any(|p| role_arn.contains(p)) {
            return Err(CloudError::api(
                codes::ACCESS_DENIED,
                format!("not authorized to perform sts:AssumeRole on {}", role_arn),
            ));
        }
        state.assumed_roles.push(role_arn.to_string());
        Ok(SessionCredentials {
            access_key_id: "ASIAFAKEACCESSKEY".to_string(),
            secret_access_key: "fake-secret".to_string(),
            session_token: "fake-token".to_string(),
            expiration: None,
        })
    }

    async fn get_caller_identity(&self) -> Result<CallerIdentity> {
        let state = self.enter("GetCallerIdentity", "")?;
        Ok(CallerIdentity {
            account: state.caller_account.clone(),
            arn: Some(format!("arn:aws:iam::{}:user/operator", state.caller_account)),
            user_id: None,
        })
    }
}

/// Hands out the same `FakeCloud` for every credential source and records
/// which sources were requested.
#[derive(Debug, Clone)]
pub struct FakeClientBuilder {
    cloud: FakeCloud,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeClientBuilder {
    pub fn new(cloud: FakeCloud) -> Self {
        Self {
            cloud,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn cloud(&self) -> &FakeCloud {
        &self.cloud
    }

    /// Credential sources requested so far (`operator`, `secret:<ns>/<name>`, `session`)
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, source: String) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(source);
    }
}

#[async_trait]
impl ClientBuilder for FakeClientBuilder {
    async fn operator_client(&self, _region: &str) -> Result<Arc<dyn CloudClient>> {
        self.record("operator".to_string());
        Ok(Arc::new(self.cloud.clone()))
    }

    async fn client_from_secret(
        &self,
        secret: &SecretRef,
        _region: &str,
    ) -> Result<Arc<dyn CloudClient>> {
        self.record(format!("secret:{}", secret));
        Ok(Arc::new(self.cloud.clone()))
    }

    async fn client_from_session(
        &self,
        _credentials: &SessionCredentials,
        _region: &str,
    ) -> Result<Arc<dyn CloudClient>> {
        self.record("session".to_string());
        Ok(Arc::new(self.cloud.clone()))
    }
}
