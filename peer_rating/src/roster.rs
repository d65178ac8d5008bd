use std::collections::HashSet;

use crate::config::RatingErrors;

/// A fixed partition of the team. Ratings only happen inside a subgroup.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Subgroup {
    pub name: String,
    pub members: Vec<String>,
}

impl Subgroup {
    pub fn new(name: &str, members: &[&str]) -> Subgroup {
        Subgroup {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

/// Who belongs to which subgroup.
///
/// Invariant: every member belongs to exactly one subgroup, and every
/// subgroup has at least two members.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Roster {
    subgroups: Vec<Subgroup>,
}

impl Roster {
    pub fn new(subgroups: Vec<Subgroup>) -> Result<Roster, RatingErrors> {
        let mut group_names: HashSet<String> = HashSet::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cleaned: Vec<Subgroup> = Vec::new();
        for sg in subgroups.into_iter() {
            let name = sg.name.trim().to_string();
            if name.is_empty() {
                return Err(RatingErrors::EmptyIdentifier("subgroup name"));
            }
            if !group_names.insert(name.clone()) {
                return Err(RatingErrors::InvalidRoster(format!(
                    "subgroup {} is declared twice",
                    name
                )));
            }
            let mut members: Vec<String> = Vec::new();
            for m in sg.members.iter() {
                let member = m.trim().to_string();
                if member.is_empty() {
                    return Err(RatingErrors::EmptyIdentifier("member name"));
                }
                if !seen.insert(member.clone()) {
                    return Err(RatingErrors::InvalidRoster(format!(
                        "{} is listed more than once",
                        member
                    )));
                }
                members.push(member);
            }
            if members.len() < 2 {
                return Err(RatingErrors::InvalidRoster(format!(
                    "subgroup {} needs at least two members",
                    name
                )));
            }
            cleaned.push(Subgroup { name, members });
        }
        if cleaned.is_empty() {
            return Err(RatingErrors::InvalidRoster("no subgroup defined".to_string()));
        }
        Ok(Roster { subgroups: cleaned })
    }

    pub fn subgroups(&self) -> &[Subgroup] {
        &self.subgroups
    }

    pub fn subgroup(&self, name: &str) -> Option<&Subgroup> {
        self.subgroups.iter().find(|sg| sg.name == name)
    }

    pub fn subgroup_of(&self, member: &str) -> Option<&Subgroup> {
        self.subgroups.iter().find(|sg| sg.contains(member))
    }

    pub fn contains(&self, member: &str) -> bool {
        self.subgroup_of(member).is_some()
    }

    /// All the members, subgroup after subgroup.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.subgroups
            .iter()
            .flat_map(|sg| sg.members.iter().map(|m| m.as_str()))
    }

    /// The peers a rater has to score: the other members of the subgroup, in roster order.
    pub fn peers(&self, subgroup: &str, rater: &str) -> Result<Vec<String>, RatingErrors> {
        let sg = self
            .subgroup(subgroup)
            .ok_or_else(|| RatingErrors::InvalidRoster(format!("unknown subgroup {}", subgroup)))?;
        if !sg.contains(rater) {
            return Err(RatingErrors::NotInSubgroup {
                name: rater.to_string(),
                subgroup: subgroup.to_string(),
            });
        }
        Ok(sg.members.iter().filter(|m| *m != rater).cloned().collect())
    }
}
