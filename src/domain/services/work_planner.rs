// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::models::session::ConcurrencyConfig;
use crate::domain::models::task::{ScrapeTask, TaskId};

/// 有界资源池抽象
///
/// 只负责计数，不持有任何任务。调度逻辑通过它判断某一维度上
/// 是否还有空闲槽位。
pub trait BoundedPool: Send + Sync {
    /// 池容量
    fn capacity(&self) -> usize;

    /// 当前占用数
    fn in_flight(&self) -> usize;

    /// 尝试占用一个槽位，已满时返回 false
    fn try_acquire(&mut self) -> bool;

    /// 释放一个槽位
    fn release(&mut self);
}

/// 基于计数器的有界池
#[derive(Debug, Clone)]
pub struct CountingPool {
    capacity: usize,
    in_flight: usize,
}

impl CountingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_flight: 0,
        }
    }
}

impl BoundedPool for CountingPool {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn try_acquire(&mut self) -> bool {
        if self.in_flight >= self.capacity {
            return false;
        }
        self.in_flight += 1;
        true
    }

    fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// 去除首尾空白、丢弃空项并去重，保留首次出现的顺序
pub fn normalize_targets<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// 工作规划器
///
/// 将 地点 × 类别 的笛卡尔积展开为任务，并按两个相互独立的并发上限
/// 生成调度计划：同时活跃的地点数不超过 `simultaneous_locations`，
/// 每个活跃地点内同时运行的类别任务数不超过 `simultaneous_categories`。
#[derive(Debug, Clone, Copy)]
pub struct WorkPlanner {
    location_limit: usize,
    category_limit: usize,
}

impl WorkPlanner {
    pub fn new(concurrency: &ConcurrencyConfig) -> Self {
        Self {
            location_limit: concurrency.simultaneous_locations.max(1),
            category_limit: concurrency.simultaneous_categories.max(1),
        }
    }

    /// 生成调度计划，使用计数池作为两个维度的有界池
    pub fn plan<L, C, S>(&self, locations: L, categories: C) -> WorkPlan
    where
        L: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let category_limit = self.category_limit;
        self.plan_with_pools(
            locations,
            categories,
            Box::new(CountingPool::new(self.location_limit)),
            move || -> Box<dyn BoundedPool> { Box::new(CountingPool::new(category_limit)) },
        )
    }

    /// 使用自定义有界池生成调度计划
    ///
    /// `category_pool` 为每个地点各创建一个类别池。
    pub fn plan_with_pools<L, C, S, F>(
        &self,
        locations: L,
        categories: C,
        location_pool: Box<dyn BoundedPool>,
        category_pool: F,
    ) -> WorkPlan
    where
        L: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn() -> Box<dyn BoundedPool>,
    {
        let locations = normalize_targets(locations);
        let categories = normalize_targets(categories);

        let mut tasks = Vec::with_capacity(locations.len() * categories.len());
        let mut groups = Vec::with_capacity(locations.len());
        let mut owner = HashMap::new();

        for (group_index, location) in locations.iter().enumerate() {
            let mut pending = VecDeque::with_capacity(categories.len());
            for category in &categories {
                let id = tasks.len();
                tasks.push(ScrapeTask::new(id, location.clone(), category.clone()));
                owner.insert(id, group_index);
                pending.push_back(id);
            }
            groups.push(LocationGroup {
                location: location.clone(),
                pending,
                running: 0,
                categories: category_pool(),
                state: GroupState::Waiting,
            });
        }

        WorkPlan {
            waiting: (0..groups.len()).collect(),
            tasks,
            groups,
            owner,
            running: HashSet::new(),
            location_pool,
            cursor: 0,
            locations,
            categories,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    Waiting,
    Active,
    Done,
}

struct LocationGroup {
    location: String,
    pending: VecDeque<TaskId>,
    running: usize,
    categories: Box<dyn BoundedPool>,
    state: GroupState,
}

/// 调度计划
///
/// 由编排器独占持有。地点槽位在该地点的所有任务结束后才释放，
/// 类别槽位在单个任务结束时释放。
pub struct WorkPlan {
    tasks: Vec<ScrapeTask>,
    groups: Vec<LocationGroup>,
    owner: HashMap<TaskId, usize>,
    running: HashSet<TaskId>,
    location_pool: Box<dyn BoundedPool>,
    waiting: VecDeque<usize>,
    cursor: usize,
    locations: Vec<String>,
    categories: Vec<String>,
}

impl WorkPlan {
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn tasks(&self) -> &[ScrapeTask] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&ScrapeTask> {
        self.tasks.get(id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut ScrapeTask> {
        self.tasks.get_mut(id)
    }

    /// 任务总数，等于 |locations| × |categories|
    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// 尚未派发的任务数
    pub fn pending(&self) -> usize {
        self.groups.iter().map(|g| g.pending.len()).sum()
    }

    /// 已派发但尚未结束的任务数
    pub fn in_flight(&self) -> usize {
        self.groups.iter().map(|g| g.running).sum()
    }

    /// 当前占用地点槽位的地点数
    pub fn active_locations(&self) -> usize {
        self.location_pool.in_flight()
    }

    /// 所有任务都已派发且已结束
    pub fn is_exhausted(&self) -> bool {
        self.pending() == 0 && self.in_flight() == 0
    }

    /// 取出下一个可以派发的任务
    ///
    /// 优先激活新的地点（地点池有空位时），否则在活跃地点之间轮转，
    /// 从仍有类别空位的地点中取任务。两个维度都没有空位时返回 `None`。
    pub fn next_dispatchable(&mut self) -> Option<TaskId> {
        if let Some(id) = self.activate_next_location() {
            return Some(id);
        }

        let count = self.groups.len();
        for offset in 0..count {
            let index = (self.cursor + offset) % count;
            let group = &mut self.groups[index];
            if group.state != GroupState::Active || group.pending.is_empty() {
                continue;
            }
            if !group.categories.try_acquire() {
                continue;
            }
            if let Some(id) = group.pending.pop_front() {
                group.running += 1;
                self.running.insert(id);
                self.cursor = (index + 1) % count;
                return Some(id);
            }
            group.categories.release();
        }

        None
    }

    fn activate_next_location(&mut self) -> Option<TaskId> {
        while let Some(&index) = self.waiting.front() {
            if !self.location_pool.try_acquire() {
                return None;
            }
            self.waiting.pop_front();

            let group = &mut self.groups[index];
            group.state = GroupState::Active;
            if group.categories.try_acquire() {
                if let Some(id) = group.pending.pop_front() {
                    group.running += 1;
                    self.running.insert(id);
                    return Some(id);
                }
                group.categories.release();
            }

            // Nothing to run for this location
            if group.pending.is_empty() && group.running == 0 {
                group.state = GroupState::Done;
                self.location_pool.release();
            }
        }
        None
    }

    /// 标记一个已派发的任务结束，释放其类别槽位
    ///
    /// 地点的最后一个任务结束时同时释放地点槽位。
    /// 对未派发或未知的任务返回 false。
    pub fn complete(&mut self, id: TaskId) -> bool {
        if !self.running.remove(&id) {
            return false;
        }
        let Some(&index) = self.owner.get(&id) else {
            return false;
        };
        let group = &mut self.groups[index];
        group.running -= 1;
        group.categories.release();

        if group.pending.is_empty() && group.running == 0 {
            group.state = GroupState::Done;
            self.location_pool.release();
        }
        true
    }

    /// 某个地点当前运行中的任务数
    pub fn running_in(&self, location: &str) -> usize {
        self.groups
            .iter()
            .find(|g| g.location == location)
            .map_or(0, |g| g.running)
    }
}
